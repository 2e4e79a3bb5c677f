//! Session orchestration: one eager search, many lazy views.
//!
//! A [`Dumper`] holds the query, the profile and the issue source. Opening it
//! discovers the schema, negotiates the request and materializes every
//! matching issue into a [`DumpSession`]. Views on the session replay the
//! cached records and can be requested any number of times; `worklogs` and
//! `sla_overview` issue one extra request per cached issue as they are
//! consumed. Closing the session hands the dumper back and drops the cache.

use serde_json::Value;

use crate::extract::{self, HistorySpec, OutputRow};
use crate::jira::JiraError;
use crate::logging;
use crate::paginate::{IssueSource, Paginator, SubResource, PAGE_SIZE};
use crate::path::{FieldPath, SchemaError};
use crate::profile::{self, DumpProfile};
use crate::schema::{FieldSchema, RequestPlan};

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("invalid field declaration: {0}")]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Jira(#[from] JiraError),
}

#[derive(Debug)]
pub struct Dumper<S> {
    source: S,
    query: String,
    profile: DumpProfile,
    page_size: usize,
}

#[derive(Debug)]
pub struct DumpSession<S> {
    dumper: Dumper<S>,
    schema: FieldSchema,
    plan: RequestPlan,
    records: Vec<Value>,
}

impl<S: IssueSource> Dumper<S> {
    pub fn new(source: S, query: impl Into<String>, profile: DumpProfile) -> Self {
        Self {
            source,
            query: query.into(),
            profile,
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn profile(&self) -> &DumpProfile {
        &self.profile
    }

    /// Fetches every issue matching the query and caches it for the session.
    pub fn open(self) -> Result<DumpSession<S>, DumpError> {
        let schema = profile::discover(&self.profile)?;
        let plan = profile::plan_request(&self.profile, &schema);
        logging::info(format!(
            "searching issues jql='{}' fields={} expand={}",
            self.query,
            plan.fields_param(),
            plan.expand_param()
        ));

        let records = Paginator::new(&self.source, &self.query, &plan, self.page_size)
            .collect::<Result<Vec<_>, _>>()?;
        logging::info(format!("cached {} issues", records.len()));

        Ok(DumpSession {
            dumper: self,
            schema,
            plan,
            records,
        })
    }
}

impl<S: IssueSource> DumpSession<S> {
    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn plan(&self) -> &RequestPlan {
        &self.plan
    }

    pub fn profile(&self) -> &DumpProfile {
        &self.dumper.profile
    }

    pub fn issues(&self) -> impl Iterator<Item = OutputRow> + '_ {
        self.records
            .iter()
            .map(|record| extract::extract(record, &self.schema))
    }

    /// Changelog items whose `field` is `field`, one row per item.
    pub fn history_items<'a>(&'a self, field: &'a str) -> impl Iterator<Item = OutputRow> + 'a {
        let spec = HistorySpec {
            field,
            history_fields: &self.profile().history_fields,
            item_fields: &self.profile().item_fields,
        };
        self.records
            .iter()
            .flat_map(move |record| extract::extract_history(record, spec))
    }

    pub fn transitions(&self) -> impl Iterator<Item = OutputRow> + '_ {
        self.history_items(&self.profile().transition_field)
    }

    pub fn comments(&self) -> impl Iterator<Item = OutputRow> + '_ {
        self.nested(
            FieldPath::in_fields(["comment", "comments"]),
            &self.profile().comment_fields,
        )
    }

    pub fn fix_versions(&self) -> impl Iterator<Item = OutputRow> + '_ {
        self.nested(
            FieldPath::in_fields(["fixVersions"]),
            &self.profile().fix_version_fields,
        )
    }

    /// Worklogs of every cached issue; one request per issue as the view advances.
    ///
    /// A failed request is yielded once as `Err` and ends the view.
    pub fn worklogs(&self) -> impl Iterator<Item = Result<OutputRow, JiraError>> + '_ {
        self.sub_resource(SubResource::Worklogs, &self.profile().worklog_fields)
    }

    pub fn sla_overview(&self) -> impl Iterator<Item = Result<OutputRow, JiraError>> + '_ {
        self.sub_resource(SubResource::SlaOverview, &self.profile().sla_overview_fields)
    }

    /// Releases the cached records and returns the dumper for a fresh session.
    pub fn close(self) -> Dumper<S> {
        logging::debug(format!("closing session with {} issues", self.records.len()));
        self.dumper
    }

    fn nested<'a>(
        &'a self,
        list_path: FieldPath,
        schema: &'a FieldSchema,
    ) -> impl Iterator<Item = OutputRow> + 'a {
        self.records.iter().flat_map(move |record| {
            extract::extract_list(record, &list_path, schema, extract::issue_key)
        })
    }

    fn sub_resource<'a>(
        &'a self,
        kind: SubResource,
        schema: &'a FieldSchema,
    ) -> impl Iterator<Item = Result<OutputRow, JiraError>> + 'a {
        let mut rows = self.records.iter().flat_map(move |record| {
            let parent = extract::issue_key(record);
            let fetched = match parent.as_str() {
                Some(key) => self.dumper.source.fetch_sub_resource(key, kind),
                None => {
                    logging::warn(format!("skipping {:?} for issue without a key", kind));
                    Ok(Vec::new())
                }
            };
            let rows: Box<dyn Iterator<Item = Result<OutputRow, JiraError>> + 'a> = match fetched
            {
                Ok(entries) => Box::new(extract::extract_entries(parent, entries, schema).map(Ok)),
                Err(err) => Box::new(std::iter::once(Err(err))),
            };
            rows
        });

        // A failed fetch ends the view; later issues are never requested.
        let mut failed = false;
        std::iter::from_fn(move || {
            if failed {
                return None;
            }
            let row = rows.next()?;
            failed = row.is_err();
            Some(row)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::paginate::testing::FakeSource;

    fn sample_issue() -> Value {
        json!({
            "key": "PROJ-1",
            "fields": {
                "created": "2026-01-01T10:00:00.000+0000",
                "status": {"name": "Done"},
                "summary": "Export everything",
                "assignee": {"name": "ada"},
                "comment": {"comments": [
                    {"created": "2026-01-02", "author": {"name": "bob"}, "body": "ship it"}
                ]},
                "fixVersions": [
                    {"name": "1.0", "description": "first", "releaseDate": "2026-02-01"}
                ]
            },
            "changelog": {"histories": [
                {
                    "author": {"name": "ada"},
                    "created": "2026-01-03",
                    "items": [
                        {"field": "status", "fromString": "Open", "toString": "Done"},
                        {"field": "labels", "fromString": "", "toString": "export"}
                    ]
                }
            ]}
        })
    }

    fn source() -> FakeSource {
        FakeSource::with_records(vec![sample_issue()])
            .with_sub_resource(
                "PROJ-1",
                SubResource::Worklogs,
                vec![json!({
                    "author": {"name": "ada"},
                    "comment": "pairing",
                    "started": "2026-01-02T09:00:00.000+0000",
                    "timeSpentSeconds": 3600
                })],
            )
            .with_sub_resource(
                "PROJ-1",
                SubResource::SlaOverview,
                vec![json!({"status": "MET", "slaName": "Resolution"})],
            )
    }

    #[test]
    fn single_issue_end_to_end() {
        let source = source();
        let session = Dumper::new(&source, "project = PROJ", DumpProfile::default())
            .open()
            .expect("open");

        let issues: Vec<_> = session.issues().collect();
        let worklogs: Vec<_> = session
            .worklogs()
            .collect::<Result<_, _>>()
            .expect("worklogs");
        let transitions: Vec<_> = session.transitions().collect();
        let comments: Vec<_> = session.comments().collect();
        let fix_versions: Vec<_> = session.fix_versions().collect();
        let sla: Vec<_> = session
            .sla_overview()
            .collect::<Result<_, _>>()
            .expect("sla");

        assert_eq!(issues.len(), 1);
        assert_eq!(worklogs.len(), 1);
        assert_eq!(transitions.len(), 1);
        assert_eq!(comments.len(), 1);
        assert_eq!(fix_versions.len(), 1);
        assert_eq!(sla.len(), 1);

        let key = json!("PROJ-1");
        for row in issues
            .iter()
            .chain(&worklogs)
            .chain(&transitions)
            .chain(&comments)
            .chain(&fix_versions)
            .chain(&sla)
        {
            assert_eq!(row.get("issue"), Some(&key));
        }

        assert_eq!(issues[0].get("status"), Some(&json!("Done")));
        assert_eq!(issues[0].get("resolution"), Some(&Value::Null));
        assert_eq!(worklogs[0].get("time_spent"), Some(&json!(3600)));
        assert_eq!(transitions[0].get("from"), Some(&json!("Open")));
        assert_eq!(sla[0].get("name"), Some(&json!("Resolution")));
    }

    #[test]
    fn open_negotiates_fields_and_expand() {
        let source = source();
        let session = Dumper::new(&source, "q", DumpProfile::default())
            .open()
            .expect("open");

        let searches = source.searches.borrow();
        assert_eq!(searches.len(), 2);
        assert!(searches[0].2.ends_with("comment,fixVersions"));
        assert_eq!(searches[0].3, "changelog");
        assert_eq!(session.plan().expand, vec!["changelog"]);
    }

    #[test]
    fn views_replay_cache_without_refetching() {
        let source = source();
        let session = Dumper::new(&source, "q", DumpProfile::default())
            .open()
            .expect("open");

        assert_eq!(session.issues().count(), 1);
        assert_eq!(session.issues().count(), 1);
        assert_eq!(session.comments().count(), 1);
        assert_eq!(source.searches.borrow().len(), 2);
        assert!(source.sub_fetches.borrow().is_empty());
    }

    #[test]
    fn sub_resource_views_fetch_lazily_per_issue() {
        let second = json!({"key": "PROJ-2", "fields": {}});
        let source = FakeSource::with_records(vec![sample_issue(), second]);
        let session = Dumper::new(&source, "q", DumpProfile::default())
            .open()
            .expect("open");

        let mut worklogs = session.worklogs();
        assert!(source.sub_fetches.borrow().is_empty());
        assert!(worklogs.next().is_none());
        assert_eq!(
            *source.sub_fetches.borrow(),
            vec![
                ("PROJ-1".to_string(), SubResource::Worklogs),
                ("PROJ-2".to_string(), SubResource::Worklogs)
            ]
        );
    }

    fn three_issue_source() -> FakeSource {
        let issues = (1..=3)
            .map(|i| json!({"key": format!("PROJ-{i}"), "fields": {}}))
            .collect();
        FakeSource::with_records(issues)
            .with_sub_resource(
                "PROJ-1",
                SubResource::SlaOverview,
                vec![json!({"status": "MET", "slaName": "Response"})],
            )
            .with_sub_resource(
                "PROJ-3",
                SubResource::SlaOverview,
                vec![json!({"status": "BREACHED", "slaName": "Resolution"})],
            )
    }

    #[test]
    fn failed_worklog_fetch_ends_view_after_one_error() {
        let mut source = three_issue_source();
        source.fail_sub_fetch_for = Some("PROJ-1".to_string());
        let session = Dumper::new(&source, "q", DumpProfile::default())
            .open()
            .expect("open");

        let results: Vec<_> = session.worklogs().collect();

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(JiraError::Http { .. })));
        assert_eq!(
            *source.sub_fetches.borrow(),
            vec![("PROJ-1".to_string(), SubResource::Worklogs)]
        );
    }

    #[test]
    fn failed_sla_fetch_keeps_earlier_rows_and_stops() {
        let mut source = three_issue_source();
        source.fail_sub_fetch_for = Some("PROJ-2".to_string());
        let session = Dumper::new(&source, "q", DumpProfile::default())
            .open()
            .expect("open");

        let mut sla = session.sla_overview();
        let first = sla.next().expect("row").expect("first issue succeeds");
        assert_eq!(first.get("issue"), Some(&json!("PROJ-1")));
        assert!(matches!(sla.next(), Some(Err(JiraError::Http { .. }))));
        assert!(sla.next().is_none());
        assert!(sla.next().is_none());

        let fetched: Vec<_> = source
            .sub_fetches
            .borrow()
            .iter()
            .map(|(key, _)| key.clone())
            .collect();
        assert_eq!(fetched, vec!["PROJ-1", "PROJ-2"]);
    }

    #[test]
    fn custom_profile_changes_columns_and_transition_field() {
        let source = source();
        let mut profile = DumpProfile::default().with_issue_fields(
            &FieldSchema::new()
                .with("assignee", FieldPath::in_fields(["assignee", "displayName"]))
                .with("first_fix_version", FieldPath::in_fields(["fixVersions", "0", "name"])),
        );
        profile.transition_field = "labels".to_string();

        let session = Dumper::new(&source, "q", profile).open().expect("open");
        assert_eq!(
            session.schema().get("assignee"),
            Some(&FieldPath::in_fields(["assignee", "displayName"]))
        );
        assert_eq!(
            session.schema().columns().last(),
            Some("first_fix_version")
        );
        let issue = session.issues().next().expect("one issue");
        assert_eq!(issue.get("assignee"), Some(&Value::Null));
        assert_eq!(issue.get("first_fix_version"), Some(&json!("1.0")));

        let transitions: Vec<_> = session.transitions().collect();
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].get("to"), Some(&json!("export")));
    }

    #[test]
    fn disabled_transitions_skip_changelog_expand() {
        let source = source();
        let session = Dumper::new(&source, "q", DumpProfile::default().with_transitions(false))
            .open()
            .expect("open");

        assert!(session.plan().expand.is_empty());
        assert_eq!(source.searches.borrow()[0].3, "");
    }

    #[test]
    fn primary_fetch_failure_aborts_open() {
        let mut source = source();
        source.fail_search_at = Some(0);

        let err = Dumper::new(&source, "q", DumpProfile::default())
            .open()
            .expect_err("open should fail");
        assert!(matches!(err, DumpError::Jira(JiraError::Http { .. })));
    }

    #[test]
    fn misdeclared_path_aborts_open_before_fetching() {
        let source = source();
        let profile = DumpProfile::default()
            .with_comment_fields(&FieldSchema::new().with("body", FieldPath::new(Vec::<String>::new())));

        let err = Dumper::new(&source, "q", profile)
            .open()
            .expect_err("open should fail");
        assert!(matches!(err, DumpError::Schema(SchemaError::EmptyPath { .. })));
        assert!(source.searches.borrow().is_empty());
    }

    #[test]
    fn close_returns_dumper_for_new_session() {
        let source = source();
        let session = Dumper::new(&source, "q", DumpProfile::default())
            .with_page_size(10)
            .open()
            .expect("open");
        let dumper = session.close();

        let reopened = dumper.open().expect("reopen");
        assert_eq!(reopened.records().len(), 1);
        assert_eq!(source.searches.borrow()[2].1, 10);
    }
}
