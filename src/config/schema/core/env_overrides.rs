use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("CHANNEL_MEMORY_DIR")
            && !dir.is_empty()
        {
            self.memory.memories_dir = dir;
        }

        if let Ok(budget_str) = std::env::var("CHANNEL_MEMORY_TOKEN_BUDGET")
            && let Ok(budget) = budget_str.parse::<i64>()
        {
            self.memory.token_budget = budget;
        }

        if let Ok(server_wide) = std::env::var("CHANNEL_MEMORY_SERVER_WIDE")
            && let Ok(server_wide) = server_wide.parse::<bool>()
        {
            self.memory.server_wide = server_wide;
        }

        if let Ok(provider) = std::env::var("CHANNEL_MEMORY_PROVIDER")
            && !provider.is_empty()
        {
            self.summarizer.provider = provider;
        }

        if let Ok(model) = std::env::var("CHANNEL_MEMORY_MODEL")
            && !model.is_empty()
        {
            self.summarizer.model = model;
        }

        if let Ok(key) = std::env::var("CHANNEL_MEMORY_API_KEY")
            && !key.is_empty()
        {
            self.summarizer.api_key = Some(key);
        }

        if let Ok(level) = std::env::var("CHANNEL_MEMORY_LOG")
            && !level.is_empty()
        {
            self.observability.log_level = level;
        }
    }
}
