//! Budgeted retrieval: fill a token budget finest-and-freshest first.

use super::buffer::IngestionBuffer;
use super::period::date_id;
use super::sections::parse_sections;
use super::store::TierStore;
use super::tokens::{estimate_tokens, truncate_to_tokens};
use super::types::{ChannelInfo, LoadedMemory, RawEntry, RetrievalResult, Scope, Tier, decode_jsonl};
use crate::channels::ChannelDirectory;
use crate::error::MemoryError;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

const SUMMARY_TIERS: [Tier; 3] = [Tier::Daily, Tier::Weekly, Tier::Monthly];

pub struct MemoryRetriever {
    store: Arc<dyn TierStore>,
    buffer: Option<IngestionBuffer>,
    directory: Arc<ChannelDirectory>,
}

/// Which scope to read and whose content goes first.
struct Target<'a> {
    scope: Scope,
    /// Display name used for untitled content and for prioritizing sections.
    current_name: &'a str,
}

struct Accumulator {
    budget: usize,
    memories: Vec<LoadedMemory>,
    total: usize,
}

impl Accumulator {
    fn new(budget: usize) -> Self {
        Self {
            budget,
            memories: Vec::new(),
            total: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.budget - self.total
    }

    /// Add a whole artifact (all its items) or nothing.
    fn try_add_all(&mut self, items: Vec<LoadedMemory>) -> bool {
        let tokens: usize = items.iter().map(|item| item.token_count).sum();
        if tokens > self.remaining() {
            return false;
        }
        self.total += tokens;
        self.memories.extend(items);
        true
    }

    fn finish(self) -> RetrievalResult {
        let budget_used = if self.budget == 0 {
            0.0
        } else {
            self.total as f64 / self.budget as f64 * 100.0
        };
        RetrievalResult {
            memories: self.memories,
            total_tokens: self.total,
            budget_used,
        }
    }
}

impl MemoryRetriever {
    pub fn new(
        store: Arc<dyn TierStore>,
        buffer: Option<IngestionBuffer>,
        directory: Arc<ChannelDirectory>,
    ) -> Self {
        Self {
            store,
            buffer,
            directory,
        }
    }

    /// Context for one channel's own memory.
    pub async fn load_memories_for_channel(
        &self,
        channel_id: &str,
        token_budget: usize,
    ) -> RetrievalResult {
        self.load_memories_for_channel_at(channel_id, token_budget, Utc::now().date_naive())
            .await
    }

    pub async fn load_memories_for_channel_at(
        &self,
        channel_id: &str,
        token_budget: usize,
        today: NaiveDate,
    ) -> RetrievalResult {
        let scope = match Scope::parse(channel_id) {
            Ok(scope @ Scope::Channel(_)) => scope,
            Ok(Scope::Server) | Err(_) => {
                tracing::warn!(channel_id, "cannot load memory for unusable channel id");
                return RetrievalResult::default();
            }
        };
        let name = self.directory.name_for(channel_id);
        let target = Target {
            scope,
            current_name: &name,
        };
        self.load(&target, token_budget, today).await
    }

    /// Context from the server-wide memory, with `current_channel_id`'s
    /// content ahead of other channels within each artifact.
    pub async fn load_memories_for_server(
        &self,
        current_channel_id: &str,
        all_channels: &[ChannelInfo],
        token_budget: usize,
    ) -> RetrievalResult {
        self.load_memories_for_server_at(
            current_channel_id,
            all_channels,
            token_budget,
            Utc::now().date_naive(),
        )
        .await
    }

    pub async fn load_memories_for_server_at(
        &self,
        current_channel_id: &str,
        all_channels: &[ChannelInfo],
        token_budget: usize,
        today: NaiveDate,
    ) -> RetrievalResult {
        let name = all_channels
            .iter()
            .find(|channel| channel.id == current_channel_id)
            .map(|channel| channel.name.clone())
            .unwrap_or_else(|| self.directory.name_for(current_channel_id));
        let target = Target {
            scope: Scope::Server,
            current_name: &name,
        };
        self.load(&target, token_budget, today).await
    }

    async fn load(&self, target: &Target<'_>, budget: usize, today: NaiveDate) -> RetrievalResult {
        if budget == 0 {
            tracing::warn!(scope = %target.scope, "token budget is zero; returning no memory");
            return RetrievalResult::default();
        }
        let mut acc = Accumulator::new(budget);
        let today_id = date_id(today);

        let raw_items = match self.today_raw(target, today).await {
            Ok(items) => items,
            Err(error) => {
                tracing::warn!(
                    scope = %target.scope,
                    error = %error,
                    "failed to read today's raw memory"
                );
                return acc.finish();
            }
        };
        for item in raw_items {
            if item.token_count <= acc.remaining() {
                acc.total += item.token_count;
                acc.memories.push(item);
                continue;
            }
            // Raw overflows: keep its newest tail and stop here.
            let remaining = acc.remaining();
            if remaining > 0 {
                let content = truncate_to_tokens(&item.content, remaining);
                if !content.is_empty() {
                    acc.total += remaining;
                    acc.memories.push(LoadedMemory {
                        content,
                        token_count: remaining,
                        ..item
                    });
                }
            }
            return acc.finish();
        }

        for tier in SUMMARY_TIERS {
            let identifiers = match self.store.list(tier, &target.scope).await {
                Ok(identifiers) => identifiers,
                Err(error) => {
                    tracing::warn!(
                        tier = %tier,
                        scope = %target.scope,
                        error = %error,
                        "failed to list memory tier"
                    );
                    return acc.finish();
                }
            };

            for identifier in identifiers {
                if tier == Tier::Daily && identifier >= today_id {
                    continue;
                }
                let content = match self.store.get(tier, &target.scope, &identifier).await {
                    Ok(Some(content)) => content,
                    Ok(None) => continue,
                    Err(error) => {
                        tracing::warn!(
                            tier = %tier,
                            scope = %target.scope,
                            identifier = %identifier,
                            error = %error,
                            "failed to read memory artifact"
                        );
                        return acc.finish();
                    }
                };
                let items = split_artifact(tier, &identifier, &content, target.current_name);
                if items.is_empty() {
                    continue;
                }
                if !acc.try_add_all(items) {
                    break;
                }
            }
        }
        acc.finish()
    }

    /// Today's raw entries as one item per channel, current channel first.
    async fn today_raw(
        &self,
        target: &Target<'_>,
        today: NaiveDate,
    ) -> Result<Vec<LoadedMemory>, MemoryError> {
        let identifier = date_id(today);
        let buffered = self
            .buffer
            .as_ref()
            .and_then(|buffer| buffer.snapshot(&target.scope, today));
        let mut entries = match buffered {
            Some(entries) => entries,
            None => match self.store.get(Tier::Raw, &target.scope, &identifier).await? {
                Some(raw) => decode_jsonl(&raw),
                None => Vec::new(),
            },
        };
        entries.sort_by_key(|entry| entry.timestamp);

        if !target.scope.is_server() {
            if entries.is_empty() {
                return Ok(Vec::new());
            }
            return Ok(vec![loaded(
                Tier::Raw,
                &identifier,
                target.current_name,
                &render_raw(&entries),
            )]);
        }

        let mut names: Vec<&str> = entries.iter().map(|e| e.channel_name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        prioritize(&mut names, target.current_name, |name| *name);

        Ok(names
            .into_iter()
            .map(|name| {
                let channel_entries: Vec<RawEntry> = entries
                    .iter()
                    .filter(|e| e.channel_name == name)
                    .cloned()
                    .collect();
                loaded(Tier::Raw, &identifier, name, &render_raw(&channel_entries))
            })
            .collect())
    }
}

fn render_raw(entries: &[RawEntry]) -> String {
    entries
        .iter()
        .map(RawEntry::render_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn loaded(tier: Tier, identifier: &str, channel_name: &str, content: &str) -> LoadedMemory {
    LoadedMemory {
        tier,
        identifier: identifier.to_string(),
        channel_name: channel_name.to_string(),
        content: content.to_string(),
        token_count: estimate_tokens(content),
    }
}

/// Move the item named `current` to the front, keeping the rest in order.
fn prioritize<T>(items: &mut [T], current: &str, name: impl Fn(&T) -> &str) {
    if let Some(pos) = items.iter().position(|item| name(item) == current) {
        items[..=pos].rotate_right(1);
    }
}

/// One item per channel section; untitled content belongs to `current_name`.
fn split_artifact(
    tier: Tier,
    identifier: &str,
    content: &str,
    current_name: &str,
) -> Vec<LoadedMemory> {
    let mut items: Vec<LoadedMemory> = parse_sections(content)
        .into_iter()
        .map(|section| {
            let channel = section.channel.as_deref().unwrap_or(current_name);
            loaded(tier, identifier, channel, &section.body)
        })
        .collect();
    prioritize(&mut items, current_name, |item| item.channel_name.as_str());
    items
}
