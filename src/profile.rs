//! Declarative dump configuration and schema discovery.
//!
//! A [`DumpProfile`] holds every column schema the dumper extracts together
//! with the flags that switch optional sections on or off. Callers customize a
//! dump by overlaying named columns or toggling flags; nothing in the
//! extraction pipeline needs to know about the additions ahead of time.

use crate::path::{FieldPath, SchemaError};
use crate::schema::{FieldSchema, RequestPlan};

pub const CHANGELOG_SECTION: &str = "changelog";
pub const COMMENT_FIELD: &str = "comment";
pub const FIX_VERSIONS_FIELD: &str = "fixVersions";
pub const DEFAULT_TRANSITION_FIELD: &str = "status";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpProfile {
    pub issue_fields: FieldSchema,
    pub worklog_fields: FieldSchema,
    pub history_fields: FieldSchema,
    pub item_fields: FieldSchema,
    pub comment_fields: FieldSchema,
    pub fix_version_fields: FieldSchema,
    pub sla_overview_fields: FieldSchema,
    pub transitions: bool,
    pub comments: bool,
    pub fix_versions: bool,
    /// Changelog item `field` value that marks a transition.
    pub transition_field: String,
}

/// Column overlays for each schema of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileOverrides {
    pub issue: FieldSchema,
    pub worklog: FieldSchema,
    pub history: FieldSchema,
    pub item: FieldSchema,
    pub comment: FieldSchema,
    pub fix_version: FieldSchema,
    pub sla_overview: FieldSchema,
}

impl Default for DumpProfile {
    fn default() -> Self {
        Self {
            issue_fields: default_issue_fields(),
            worklog_fields: FieldSchema::new()
                .with("author", ["author", "name"])
                .with("comment", ["comment"])
                .with("started", ["started"])
                .with("time_spent", ["timeSpentSeconds"]),
            history_fields: FieldSchema::new()
                .with("author", ["author", "name"])
                .with("created", ["created"]),
            item_fields: FieldSchema::new()
                .with("from", ["fromString"])
                .with("to", ["toString"]),
            comment_fields: FieldSchema::new()
                .with("created", ["created"])
                .with("author", ["author", "name"])
                .with("body", ["body"]),
            fix_version_fields: FieldSchema::new()
                .with("name", ["name"])
                .with("description", ["description"])
                .with("release_date", ["releaseDate"]),
            sla_overview_fields: FieldSchema::new()
                .with("status", ["status"])
                .with("name", ["slaName"])
                .with("working_duration_seconds", ["workingDurationAsSeconds"])
                .with("sla_value_minutes", ["slaValueAsMinutes"]),
            transitions: true,
            comments: true,
            fix_versions: true,
            transition_field: DEFAULT_TRANSITION_FIELD.to_string(),
        }
    }
}

fn default_issue_fields() -> FieldSchema {
    FieldSchema::new()
        .with("issue", ["key"])
        .with("creation_date", FieldPath::in_fields(["created"]))
        .with("status", FieldPath::in_fields(["status", "name"]))
        .with("issue_type", FieldPath::in_fields(["issuetype", "name"]))
        .with("summary", FieldPath::in_fields(["summary"]))
        .with("resolution", FieldPath::in_fields(["resolution", "name"]))
        .with("assignee", FieldPath::in_fields(["assignee", "name"]))
        .with("reporter", FieldPath::in_fields(["reporter", "name"]))
        .with("priority", FieldPath::in_fields(["priority", "name"]))
        .with(
            "original_estimate",
            FieldPath::in_fields(["timetracking", "originalEstimateSeconds"]),
        )
        .with(
            "remaining_estimate",
            FieldPath::in_fields(["timetracking", "remainingEstimateSeconds"]),
        )
        .with(
            "time_spent",
            FieldPath::in_fields(["timetracking", "timeSpentSeconds"]),
        )
}

impl DumpProfile {
    pub fn with_issue_fields(mut self, overrides: &FieldSchema) -> Self {
        self.issue_fields = self.issue_fields.overlay(overrides);
        self
    }

    pub fn with_worklog_fields(mut self, overrides: &FieldSchema) -> Self {
        self.worklog_fields = self.worklog_fields.overlay(overrides);
        self
    }

    pub fn with_comment_fields(mut self, overrides: &FieldSchema) -> Self {
        self.comment_fields = self.comment_fields.overlay(overrides);
        self
    }

    pub fn with_transitions(mut self, enabled: bool) -> Self {
        self.transitions = enabled;
        self
    }

    pub fn with_comments(mut self, enabled: bool) -> Self {
        self.comments = enabled;
        self
    }

    pub fn with_fix_versions(mut self, enabled: bool) -> Self {
        self.fix_versions = enabled;
        self
    }

    /// Overlays every schema of the profile at once.
    pub fn apply_overrides(mut self, overrides: &ProfileOverrides) -> Self {
        self.issue_fields = self.issue_fields.overlay(&overrides.issue);
        self.worklog_fields = self.worklog_fields.overlay(&overrides.worklog);
        self.history_fields = self.history_fields.overlay(&overrides.history);
        self.item_fields = self.item_fields.overlay(&overrides.item);
        self.comment_fields = self.comment_fields.overlay(&overrides.comment);
        self.fix_version_fields = self.fix_version_fields.overlay(&overrides.fix_version);
        self.sla_overview_fields = self.sla_overview_fields.overlay(&overrides.sla_overview);
        self
    }

    /// Checks every declared path of every schema.
    pub fn validate(&self) -> Result<(), SchemaError> {
        self.schemas()
            .into_iter()
            .try_for_each(FieldSchema::validate)
    }

    fn schemas(&self) -> [&FieldSchema; 7] {
        [
            &self.issue_fields,
            &self.worklog_fields,
            &self.history_fields,
            &self.item_fields,
            &self.comment_fields,
            &self.fix_version_fields,
            &self.sla_overview_fields,
        ]
    }
}

/// Validates every declaration of `profile` and returns its issue schema.
pub fn discover(profile: &DumpProfile) -> Result<FieldSchema, SchemaError> {
    profile.validate()?;
    Ok(profile.issue_fields.clone())
}

/// Builds the search parameters for `schema`, adding the sections enabled on `profile`.
pub fn plan_request(profile: &DumpProfile, schema: &FieldSchema) -> RequestPlan {
    let mut plan = schema.partition();
    if profile.transitions {
        plan.add_expand(CHANGELOG_SECTION);
    }
    if profile.comments {
        plan.add_field(COMMENT_FIELD);
    }
    if profile.fix_versions {
        plan.add_field(FIX_VERSIONS_FIELD);
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_profile_discovers_superset_with_overrides() {
        let base = discover(&DumpProfile::default()).expect("base discovers");
        let custom = DumpProfile::default().with_issue_fields(
            &FieldSchema::new()
                .with("assignee", FieldPath::in_fields(["assignee", "displayName"]))
                .with("labels", FieldPath::in_fields(["labels"])),
        );
        let derived = discover(&custom).expect("derived discovers");

        for (column, path) in base.iter() {
            let derived_path = derived.get(column).expect("column kept");
            if column == "assignee" {
                assert_eq!(
                    derived_path,
                    &FieldPath::in_fields(["assignee", "displayName"])
                );
            } else {
                assert_eq!(derived_path, path);
            }
        }
        assert!(derived.get("labels").is_some());
        assert_eq!(derived.len(), base.len() + 1);
    }

    #[test]
    fn discover_rejects_misdeclared_nested_schema() {
        let mut profile = DumpProfile::default();
        profile
            .sla_overview_fields
            .insert("broken", FieldPath::from(["slaName", ""]));

        let err = discover(&profile).expect_err("misdeclared path should fail");
        assert!(matches!(err, SchemaError::EmptySegment { ref column, .. } if column == "broken"));
    }

    #[test]
    fn default_plan_requests_fields_and_conditional_sections() {
        let profile = DumpProfile::default();
        let schema = discover(&profile).expect("discovers");
        let plan = plan_request(&profile, &schema);

        assert_eq!(
            plan.fields,
            vec![
                "created",
                "status",
                "issuetype",
                "summary",
                "resolution",
                "assignee",
                "reporter",
                "priority",
                "timetracking",
                "comment",
                "fixVersions",
            ]
        );
        assert_eq!(plan.expand, vec!["changelog"]);
    }

    #[test]
    fn disabled_flags_drop_conditional_sections() {
        let profile = DumpProfile::default()
            .with_transitions(false)
            .with_comments(false)
            .with_fix_versions(false);
        let schema = discover(&profile).expect("discovers");
        let plan = plan_request(&profile, &schema);

        assert!(plan.expand.is_empty());
        assert!(!plan.fields.iter().any(|f| f == COMMENT_FIELD));
        assert!(!plan.fields.iter().any(|f| f == FIX_VERSIONS_FIELD));
    }

    #[test]
    fn apply_overrides_touches_every_schema() {
        let overrides = ProfileOverrides {
            item: FieldSchema::new().with("from_id", ["from"]),
            sla_overview: FieldSchema::new().with("name", ["slaDisplayName"]),
            ..ProfileOverrides::default()
        };
        let profile = DumpProfile::default().apply_overrides(&overrides);

        assert_eq!(
            profile.item_fields.columns().collect::<Vec<_>>(),
            vec!["from", "to", "from_id"]
        );
        assert_eq!(
            profile.sla_overview_fields.get("name"),
            Some(&FieldPath::from(["slaDisplayName"]))
        );
    }
}
