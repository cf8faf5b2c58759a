//! In-memory implementations of every store trait.
//!
//! Used by the service tests and by embedders that do not need persistence.
//! Each `InMemoryStore` is isolated; clones share the same data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::bars::{AssetProfile, BarBounds, BarStore, PriceBar};
use crate::ema::{EmaRow, EmaSeed, EmaStore, WindowWrite};
use crate::errors::{DatabaseError, Error, Result};
use crate::refresh_state::{RefreshKey, RefreshState, RefreshStateStore};
use crate::sessions::{SessionDefinition, SessionKey, SessionRepositoryTrait};
use crate::timeframes::{AlignmentType, TimeframeDefinition, TimeframeRepositoryTrait};
use crate::unified::{CanonicalCount, MergeWatermark, UnifiedEmaRow, UnifiedEmaStore};
use crate::validation::{ValidationAuditStore, ValidationResult};

type NaturalKey = (String, DateTime<Utc>, String, u32, AlignmentType);

#[derive(Default)]
struct Tables {
    timeframes: BTreeMap<String, TimeframeDefinition>,
    sessions: BTreeMap<SessionKey, SessionDefinition>,
    profiles: BTreeMap<String, AssetProfile>,
    bars: BTreeMap<String, BTreeMap<DateTime<Utc>, PriceBar>>,
    states: HashMap<RefreshKey, RefreshState>,
    ema: BTreeMap<AlignmentType, Vec<EmaRow>>,
    last_write_seq: i64,
    unified: BTreeMap<NaturalKey, UnifiedEmaRow>,
    merge_watermarks: BTreeMap<AlignmentType, MergeWatermark>,
    audit: Vec<(String, DateTime<Utc>, ValidationResult)>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_ema_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `replace_windows` fail, to simulate a crash
    /// before the batch commits.
    pub fn set_fail_ema_writes(&self, fail: bool) {
        self.fail_ema_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| Error::Unexpected(format!("in-memory store poisoned: {}", e)))
    }

    /// Removes one unified row by natural key. Returns whether it existed.
    pub fn remove_unified_row(&self, row: &UnifiedEmaRow) -> Result<bool> {
        Ok(self.lock()?.unified.remove(&row.natural_key()).is_some())
    }

    /// Writes a unified row directly, replacing any row under its key.
    pub fn put_unified_row(&self, row: UnifiedEmaRow) -> Result<()> {
        self.lock()?.unified.insert(row.natural_key(), row);
        Ok(())
    }
}

#[async_trait]
impl TimeframeRepositoryTrait for InMemoryStore {
    fn list(&self) -> Result<Vec<TimeframeDefinition>> {
        Ok(self.lock()?.timeframes.values().cloned().collect())
    }

    fn get_by_code(&self, code: &str) -> Result<Option<TimeframeDefinition>> {
        Ok(self.lock()?.timeframes.get(code).cloned())
    }

    async fn insert(&self, definition: TimeframeDefinition) -> Result<TimeframeDefinition> {
        let mut tables = self.lock()?;
        if tables.timeframes.contains_key(&definition.code) {
            return Err(DatabaseError::UniqueViolation(format!(
                "timeframes.code = {}",
                definition.code
            ))
            .into());
        }
        tables
            .timeframes
            .insert(definition.code.clone(), definition.clone());
        Ok(definition)
    }

    async fn seed(&self, definitions: Vec<TimeframeDefinition>) -> Result<usize> {
        let mut tables = self.lock()?;
        let mut inserted = 0;
        for definition in definitions {
            if !tables.timeframes.contains_key(&definition.code) {
                tables.timeframes.insert(definition.code.clone(), definition);
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[async_trait]
impl SessionRepositoryTrait for InMemoryStore {
    fn get(&self, key: &SessionKey) -> Result<Option<SessionDefinition>> {
        Ok(self.lock()?.sessions.get(key).cloned())
    }

    fn list(&self) -> Result<Vec<SessionDefinition>> {
        Ok(self.lock()?.sessions.values().cloned().collect())
    }

    async fn upsert(&self, definition: SessionDefinition) -> Result<SessionDefinition> {
        self.lock()?
            .sessions
            .insert(definition.key.clone(), definition.clone());
        Ok(definition)
    }

    async fn seed(&self, definitions: Vec<SessionDefinition>) -> Result<usize> {
        let mut tables = self.lock()?;
        let mut inserted = 0;
        for definition in definitions {
            if !tables.sessions.contains_key(&definition.key) {
                tables.sessions.insert(definition.key.clone(), definition);
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[async_trait]
impl BarStore for InMemoryStore {
    fn list_asset_ids(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.profiles.keys().cloned().collect())
    }

    fn get_asset_profile(&self, asset_id: &str) -> Result<Option<AssetProfile>> {
        Ok(self.lock()?.profiles.get(asset_id).cloned())
    }

    fn get_bar_bounds(&self, asset_id: &str) -> Result<Option<BarBounds>> {
        let tables = self.lock()?;
        let Some(bars) = tables.bars.get(asset_id) else {
            return Ok(None);
        };
        match (bars.keys().next(), bars.keys().next_back()) {
            (Some(first), Some(last)) => Ok(Some(BarBounds {
                first: *first,
                last: *last,
                count: bars.len() as i64,
            })),
            _ => Ok(None),
        }
    }

    fn get_bars(&self, asset_id: &str, from: Option<DateTime<Utc>>) -> Result<Vec<PriceBar>> {
        let tables = self.lock()?;
        let Some(bars) = tables.bars.get(asset_id) else {
            return Ok(Vec::new());
        };
        Ok(match from {
            Some(from) => bars.range(from..).map(|(_, b)| b.clone()).collect(),
            None => bars.values().cloned().collect(),
        })
    }

    fn count_bars_before(&self, asset_id: &str, before: DateTime<Utc>) -> Result<i64> {
        let tables = self.lock()?;
        Ok(tables
            .bars
            .get(asset_id)
            .map_or(0, |bars| bars.range(..before).count() as i64))
    }

    fn earliest_revised_since(
        &self,
        asset_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        let tables = self.lock()?;
        Ok(tables.bars.get(asset_id).and_then(|bars| {
            bars.values()
                .filter(|b| b.updated_at > since)
                .map(|b| b.timestamp)
                .min()
        }))
    }

    async fn upsert_bars(&self, bars: Vec<PriceBar>) -> Result<usize> {
        let mut tables = self.lock()?;
        let count = bars.len();
        for bar in bars {
            tables
                .bars
                .entry(bar.asset_id.clone())
                .or_default()
                .insert(bar.timestamp, bar);
        }
        Ok(count)
    }

    async fn upsert_asset_profile(&self, profile: AssetProfile) -> Result<()> {
        self.lock()?
            .profiles
            .insert(profile.asset_id.clone(), profile);
        Ok(())
    }
}

#[async_trait]
impl RefreshStateStore for InMemoryStore {
    fn load_state(
        &self,
        asset_ids: &[String],
        timeframe_codes: &[String],
        periods: &[u32],
        alignment_source: AlignmentType,
    ) -> Result<HashMap<RefreshKey, RefreshState>> {
        let tables = self.lock()?;
        Ok(tables
            .states
            .iter()
            .filter(|(key, _)| {
                key.alignment_source == alignment_source
                    && asset_ids.contains(&key.asset_id)
                    && timeframe_codes.contains(&key.timeframe_code)
                    && periods.contains(&key.period)
            })
            .map(|(key, state)| (key.clone(), state.clone()))
            .collect())
    }

    fn get_state(&self, key: &RefreshKey) -> Result<Option<RefreshState>> {
        Ok(self.lock()?.states.get(key).cloned())
    }

    async fn save_state(
        &self,
        key: &RefreshKey,
        watermark: DateTime<Utc>,
        bar_sequence: i64,
        refreshed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.lock()?;
        match tables.states.get_mut(key) {
            Some(state) => {
                state.updated_at = refreshed_at;
                if watermark > state.last_contiguous_timestamp {
                    state.last_contiguous_timestamp = watermark;
                    state.last_bar_sequence = bar_sequence;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => {
                tables.states.insert(
                    key.clone(),
                    RefreshState {
                        key: key.clone(),
                        last_contiguous_timestamp: watermark,
                        last_bar_sequence: bar_sequence,
                        recompute_from: None,
                        updated_at: refreshed_at,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn request_recompute(&self, key: &RefreshKey, from: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.lock()?;
        match tables.states.get_mut(key) {
            Some(state) => {
                state.recompute_from = Some(state.recompute_from.map_or(from, |f| f.min(from)));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear_override(&self, key: &RefreshKey) -> Result<()> {
        if let Some(state) = self.lock()?.states.get_mut(key) {
            state.recompute_from = None;
        }
        Ok(())
    }

    async fn reset_state(&self, key: &RefreshKey) -> Result<bool> {
        Ok(self.lock()?.states.remove(key).is_some())
    }
}

#[async_trait]
impl EmaStore for InMemoryStore {
    fn latest_canonical_before(
        &self,
        key: &RefreshKey,
        before: DateTime<Utc>,
    ) -> Result<Option<EmaSeed>> {
        let tables = self.lock()?;
        Ok(tables
            .ema
            .get(&key.alignment_source)
            .and_then(|rows| {
                rows.iter()
                    .filter(|r| {
                        r.is_canonical_close
                            && !r.is_provisional()
                            && r.timestamp < before
                            && r.key() == *key
                    })
                    .max_by_key(|r| r.timestamp)
            })
            .map(|r| EmaSeed {
                timestamp: r.timestamp,
                ema_value: r.ema_value,
                derivative_1: r.derivative_1,
            }))
    }

    fn get_rows(&self, key: &RefreshKey, from: Option<DateTime<Utc>>) -> Result<Vec<EmaRow>> {
        let tables = self.lock()?;
        let mut rows: Vec<EmaRow> = tables
            .ema
            .get(&key.alignment_source)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.key() == *key && from.map_or(true, |f| r.timestamp >= f))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|r| r.timestamp);
        Ok(rows)
    }

    fn get_asset_rows(
        &self,
        alignment_source: AlignmentType,
        asset_id: &str,
        from: DateTime<Utc>,
    ) -> Result<Vec<EmaRow>> {
        let tables = self.lock()?;
        let mut rows: Vec<EmaRow> = tables
            .ema
            .get(&alignment_source)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.asset_id == asset_id && r.timestamp >= from)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(|a, b| {
            (&a.timeframe_code, a.period, a.timestamp).cmp(&(
                &b.timeframe_code,
                b.period,
                b.timestamp,
            ))
        });
        Ok(rows)
    }

    fn rows_written_after(
        &self,
        alignment_source: AlignmentType,
        after_seq: i64,
        limit: usize,
    ) -> Result<Vec<EmaRow>> {
        let tables = self.lock()?;
        let mut rows: Vec<EmaRow> = tables
            .ema
            .get(&alignment_source)
            .map(|rows| {
                rows.iter()
                    .filter(|r| r.write_seq > after_seq)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|r| r.write_seq);
        rows.truncate(limit);
        Ok(rows)
    }

    async fn replace_windows(&self, writes: Vec<WindowWrite>) -> Result<usize> {
        if self.fail_ema_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::TransactionFailed(
                "simulated write failure".to_string(),
            )
            .into());
        }
        let mut tables = self.lock()?;
        let mut seq = tables.last_write_seq;
        let mut inserted = 0;
        for write in writes {
            let table = tables.ema.entry(write.key.alignment_source).or_default();
            table.retain(|r| !(r.timestamp >= write.from && r.key() == write.key));
            for mut row in write.rows {
                seq += 1;
                row.write_seq = seq;
                table.push(row);
                inserted += 1;
            }
        }
        tables.last_write_seq = seq;
        Ok(inserted)
    }

    async fn delete_series(&self, key: &RefreshKey) -> Result<usize> {
        let mut tables = self.lock()?;
        let Some(table) = tables.ema.get_mut(&key.alignment_source) else {
            return Ok(0);
        };
        let before = table.len();
        table.retain(|r| r.key() != *key);
        Ok(before - table.len())
    }
}

fn insert_ignore(
    unified: &mut BTreeMap<NaturalKey, UnifiedEmaRow>,
    rows: Vec<UnifiedEmaRow>,
) -> usize {
    let mut inserted = 0;
    for row in rows {
        if let std::collections::btree_map::Entry::Vacant(slot) = unified.entry(row.natural_key()) {
            slot.insert(row);
            inserted += 1;
        }
    }
    inserted
}

#[async_trait]
impl UnifiedEmaStore for InMemoryStore {
    fn get_merge_watermark(
        &self,
        alignment_source: AlignmentType,
    ) -> Result<Option<MergeWatermark>> {
        Ok(self.lock()?.merge_watermarks.get(&alignment_source).cloned())
    }

    async fn merge_batch(
        &self,
        alignment_source: AlignmentType,
        rows: Vec<UnifiedEmaRow>,
        high_write_seq: i64,
    ) -> Result<usize> {
        let mut tables = self.lock()?;
        let inserted = insert_ignore(&mut tables.unified, rows);
        let watermark = tables
            .merge_watermarks
            .entry(alignment_source)
            .or_insert_with(|| MergeWatermark {
                alignment_source,
                last_write_seq: 0,
                rows_merged: 0,
                updated_at: Utc::now(),
            });
        watermark.last_write_seq = watermark.last_write_seq.max(high_write_seq);
        watermark.rows_merged += inserted as i64;
        watermark.updated_at = Utc::now();
        Ok(inserted)
    }

    async fn replace_asset_rows(
        &self,
        alignment_source: AlignmentType,
        asset_id: &str,
        from: DateTime<Utc>,
        rows: Vec<UnifiedEmaRow>,
    ) -> Result<(usize, usize)> {
        let mut tables = self.lock()?;
        let before = tables.unified.len();
        tables.unified.retain(|_, r| {
            !(r.alignment_source == alignment_source
                && r.asset_id == asset_id
                && r.timestamp >= from)
        });
        let deleted = before - tables.unified.len();
        let inserted = insert_ignore(&mut tables.unified, rows);
        Ok((deleted, inserted))
    }

    fn get_rows(
        &self,
        asset_id: &str,
        alignment_source: Option<AlignmentType>,
    ) -> Result<Vec<UnifiedEmaRow>> {
        let tables = self.lock()?;
        let mut rows: Vec<UnifiedEmaRow> = tables
            .unified
            .values()
            .filter(|r| {
                r.asset_id == asset_id
                    && alignment_source.map_or(true, |s| r.alignment_source == s)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.alignment_source, &a.timeframe_code, a.period, a.timestamp).cmp(&(
                b.alignment_source,
                &b.timeframe_code,
                b.period,
                b.timestamp,
            ))
        });
        Ok(rows)
    }

    fn list_asset_ids(&self) -> Result<Vec<String>> {
        let tables = self.lock()?;
        let ids: BTreeSet<String> = tables.unified.values().map(|r| r.asset_id.clone()).collect();
        Ok(ids.into_iter().collect())
    }

    fn count_canonical(
        &self,
        asset_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<CanonicalCount>> {
        let tables = self.lock()?;
        let mut groups: BTreeMap<(String, u32, AlignmentType), i64> = BTreeMap::new();
        for row in tables.unified.values().filter(|r| r.asset_id == asset_id) {
            let count = groups
                .entry((row.timeframe_code.clone(), row.period, row.alignment_source))
                .or_insert(0);
            if row.is_canonical_close && row.timestamp >= from && row.timestamp <= to {
                *count += 1;
            }
        }
        Ok(groups
            .into_iter()
            .map(|((timeframe_code, period, alignment_source), count)| CanonicalCount {
                asset_id: asset_id.to_string(),
                timeframe_code,
                period,
                alignment_source,
                count,
            })
            .collect())
    }
}

#[async_trait]
impl ValidationAuditStore for InMemoryStore {
    async fn append_results(
        &self,
        run_id: &str,
        checked_at: DateTime<Utc>,
        results: Vec<ValidationResult>,
    ) -> Result<usize> {
        let mut tables = self.lock()?;
        let count = results.len();
        tables.audit.extend(
            results
                .into_iter()
                .map(|r| (run_id.to_string(), checked_at, r)),
        );
        Ok(count)
    }

    fn list_results(&self, run_id: &str) -> Result<Vec<ValidationResult>> {
        Ok(self
            .lock()?
            .audit
            .iter()
            .filter(|(id, _, _)| id == run_id)
            .map(|(_, _, r)| r.clone())
            .collect())
    }
}
