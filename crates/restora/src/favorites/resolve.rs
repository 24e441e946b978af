//! Cross-referencing favorites against the visible projects.

use std::collections::HashMap;

use serde::Serialize;

use super::record::FavoriteRecord;
use super::url::normalize_url;
use crate::history::{ContentType, Group, GroupStatus, Job, JobStatus, Overlay};

/// A favorite joined with the group and job it refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFavorite {
    pub record: FavoriteRecord,
    pub group: Group,
    pub job: Job,
    /// The group and job were synthesized from the record because no
    /// current project contains it.
    pub placeholder: bool,
}

/// Matches each favorite to a project job by id, then by normalized media
/// URL. Favorites older than anything still listed get a placeholder so
/// they stay viewable.
pub fn resolve_favorites(projects: &[Group], favorites: &[FavoriteRecord]) -> Vec<ResolvedFavorite> {
    let mut by_id: HashMap<&str, (usize, usize)> = HashMap::new();
    let mut by_url: HashMap<String, (usize, usize)> = HashMap::new();
    for (gi, group) in projects.iter().enumerate() {
        for (ji, job) in group.jobs.iter().enumerate() {
            by_id.entry(job.id.as_str()).or_insert((gi, ji));
            if let Some(url) = &job.media_url {
                by_url.entry(normalize_url(url)).or_insert((gi, ji));
            }
        }
    }

    favorites
        .iter()
        .map(|record| {
            let found = by_id
                .get(record.job_id.as_str())
                .or_else(|| by_url.get(&normalize_url(&record.url)));
            match found {
                Some(&(gi, ji)) => ResolvedFavorite {
                    record: record.clone(),
                    group: projects[gi].clone(),
                    job: projects[gi].jobs[ji].clone(),
                    placeholder: false,
                },
                None => placeholder(record),
            }
        })
        .collect()
}

fn placeholder(record: &FavoriteRecord) -> ResolvedFavorite {
    let job = Job {
        id: record.job_id.clone(),
        group_id: record.group_id.clone(),
        status: JobStatus::Completed,
        created_at: Some(record.created_at),
        ended_at: Some(record.created_at),
        content_type: ContentType::Image,
        nsfw: false,
        cancel_reason: None,
        media_url: Some(record.url.clone()),
        hidden: false,
    };
    let group = Group {
        id: record.group_id.clone(),
        content_type: ContentType::Image,
        expected_count: 1,
        jobs: vec![job.clone()],
        status: GroupStatus::Completed,
        created_at: Some(record.created_at),
        width: None,
        height: None,
        model_id: String::new(),
        model_name: record.label.clone(),
        overlay: Overlay::Remote,
    };
    ResolvedFavorite {
        record: record.clone(),
        group,
        job,
        placeholder: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn project(group: &str, jobs: &[(&str, &str)]) -> Group {
        let mut g = placeholder(&FavoriteRecord::new("seed", group, "", Utc::now())).group;
        g.model_id = "restore".into();
        g.jobs = jobs
            .iter()
            .map(|(id, url)| Job {
                id: id.to_string(),
                group_id: group.to_string(),
                media_url: Some(url.to_string()),
                ..g.jobs[0].clone()
            })
            .collect();
        g
    }

    #[test]
    fn test_match_by_id() {
        let projects = vec![project("g1", &[("j1", "https://h/1.png?s=1")])];
        let favs = vec![FavoriteRecord::new("j1", "g1", "https://elsewhere/x.png", Utc::now())];
        let resolved = resolve_favorites(&projects, &favs);
        assert!(!resolved[0].placeholder);
        assert_eq!(resolved[0].job.id, "j1");
    }

    #[test]
    fn test_match_by_normalized_url() {
        let projects = vec![project("g1", &[("canonical", "https://h/1.png?sig=new")])];
        let favs = vec![FavoriteRecord::new("temp-id", "g1", "https://h/1.png?sig=old", Utc::now())];
        let resolved = resolve_favorites(&projects, &favs);
        assert!(!resolved[0].placeholder);
        assert_eq!(resolved[0].job.id, "canonical");
    }

    #[test]
    fn test_placeholder_for_unknown() {
        let favs = vec![FavoriteRecord::new("old", "g-old", "https://h/old.png", Utc::now())
            .with_label("Restore v1")];
        let resolved = resolve_favorites(&[], &favs);
        let r = &resolved[0];
        assert!(r.placeholder);
        assert_eq!(r.group.id, "g-old");
        assert_eq!(r.group.jobs.len(), 1);
        assert_eq!(r.job.media_url.as_deref(), Some("https://h/old.png"));
        assert_eq!(r.group.model_name.as_deref(), Some("Restore v1"));
        assert!(r.job.is_displayable());
    }
}
