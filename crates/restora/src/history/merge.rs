//! Page merge: folds one page of raw jobs into the committed groups.
//!
//! Pure function of its inputs; the reconciler decides whether the result
//! may be committed.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};

use super::mapping::JobMapper;
use super::model::{window_start, Group};
use crate::remote::HistoryPage;

/// Everything a merge pass reads besides the page itself.
pub struct MergeContext<'a> {
    pub now: DateTime<Utc>,
    pub retention: Duration,
    pub mapper: &'a JobMapper,
    /// Persisted hidden job ids, read right before the merge.
    pub hidden: &'a HashSet<String>,
    /// Groups deleted during this session.
    pub scheduled_deletes: &'a HashSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub groups: Vec<Group>,
    /// Cursor to request next. Never behind the cursor that was fetched.
    pub next_cursor: u64,
    pub has_more: bool,
    /// Some job in the raw page was already outside the window.
    pub saw_expired: bool,
}

/// Merges `page`, fetched at `cursor`, into `previous`.
///
/// A page fetched at cursor 0 rebuilds the list from scratch. Creation
/// times already known for a group are carried over even then, so ordering
/// never shifts between passes.
pub fn merge_page(
    ctx: &MergeContext<'_>,
    previous: &[Group],
    cursor: u64,
    page: &HistoryPage,
) -> MergeResult {
    let _span = tracing::info_span!("merge_page", cursor, jobs = page.jobs.len()).entered();
    let cutoff = window_start(ctx.now, ctx.retention);

    let known_created: HashMap<&str, DateTime<Utc>> = previous
        .iter()
        .filter_map(|g| g.created_at.map(|t| (g.id.as_str(), t)))
        .collect();

    // Step 1: retention and model filters.
    let saw_expired = page
        .jobs
        .iter()
        .any(|raw| JobMapper::anchor(raw).is_some_and(|t| t <= cutoff));
    let fresh = page.jobs.iter().filter_map(|raw| {
        let job = ctx.mapper.map_job(raw)?;
        job.in_window(ctx.now, ctx.retention).then_some((raw, job))
    });

    // Step 2: seed.
    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    if cursor != 0 {
        for group in previous {
            let mut group = group.clone();
            let had_members = !group.jobs.is_empty();
            group
                .jobs
                .retain(|j| !j.hidden && !ctx.hidden.contains(&j.id));
            mark_hidden_if_emptied(&mut group, had_members);
            index.insert(group.id.clone(), groups.len());
            groups.push(group);
        }
    }

    // Step 3: fold jobs in.
    for (raw, job) in fresh {
        if ctx.hidden.contains(&job.id) {
            if let Some(&pos) = index.get(&job.group_id) {
                let group = &mut groups[pos];
                let had_members = !group.jobs.is_empty();
                group.jobs.retain(|j| j.id != job.id);
                mark_hidden_if_emptied(group, had_members);
                group.recompute_hidden();
            }
            continue;
        }

        match index.get(&job.group_id) {
            Some(&pos) => groups[pos].upsert_job(job),
            None => {
                let mut group = JobMapper::new_group(raw);
                group.created_at = known_created
                    .get(group.id.as_str())
                    .copied()
                    .or(job.created_at)
                    .map(|t| t.min(ctx.now));
                group.jobs.push(job);
                index.insert(group.id.clone(), groups.len());
                groups.push(group);
            }
        }
    }

    // Step 4: normalize every group and order the list.
    for group in &mut groups {
        let had_members = !group.jobs.is_empty();
        group.jobs.retain(|j| !ctx.hidden.contains(&j.id));
        mark_hidden_if_emptied(group, had_members);
        group.recompute_hidden();
        if group.created_at.is_none() {
            group.created_at = group.earliest_member_time().map(|t| t.min(ctx.now));
        }
        group.recompute_status();
        if ctx.scheduled_deletes.contains(&group.id) {
            group.overlay = group.overlay.with_scheduled_delete(true);
        }
    }
    groups.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    // Step 5: keep what is still worth holding.
    groups.retain(|g| {
        !g.is_hidden() && !g.jobs.is_empty() && g.has_member_in_window(ctx.now, ctx.retention)
    });

    // Step 6: pagination.
    let forward = page
        .next_cursor
        .unwrap_or_else(|| cursor.saturating_add(page.jobs.len() as u64));
    let has_more = !page.jobs.is_empty() && forward > cursor && !saw_expired;

    MergeResult {
        groups,
        next_cursor: forward.max(cursor),
        has_more,
        saw_expired,
    }
}

fn mark_hidden_if_emptied(group: &mut Group, had_members: bool) {
    if had_members && group.jobs.is_empty() {
        group.overlay = group.overlay.with_hidden(true);
    }
}
