use serde_json::Value;

use crate::jira::JiraError;
use crate::logging;
use crate::schema::RequestPlan;

pub const PAGE_SIZE: usize = 50;

/// Per-issue resources that the search endpoint cannot embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubResource {
    Worklogs,
    SlaOverview,
}

/// Query side of the issue tracker as seen by the dumper.
pub trait IssueSource {
    /// Returns one page of raw issues; an empty page marks the end of results.
    fn search(
        &self,
        query: &str,
        plan: &RequestPlan,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>, JiraError>;

    fn fetch_sub_resource(
        &self,
        issue_key: &str,
        kind: SubResource,
    ) -> Result<Vec<Value>, JiraError>;
}

impl<S: IssueSource + ?Sized> IssueSource for &S {
    fn search(
        &self,
        query: &str,
        plan: &RequestPlan,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Value>, JiraError> {
        (**self).search(query, plan, offset, limit)
    }

    fn fetch_sub_resource(
        &self,
        issue_key: &str,
        kind: SubResource,
    ) -> Result<Vec<Value>, JiraError> {
        (**self).fetch_sub_resource(issue_key, kind)
    }
}

/// Lazily walks search results page by page.
///
/// Offsets advance by the page size. Iteration ends at the first empty page,
/// so a short final page is always followed by one more fetch. A transport
/// error is yielded once and ends iteration.
pub struct Paginator<'a, S: IssueSource + ?Sized> {
    source: &'a S,
    query: &'a str,
    plan: &'a RequestPlan,
    page_size: usize,
    offset: usize,
    page: std::vec::IntoIter<Value>,
    done: bool,
}

pub fn page_through<'a, S: IssueSource + ?Sized>(
    source: &'a S,
    query: &'a str,
    plan: &'a RequestPlan,
) -> Paginator<'a, S> {
    Paginator::new(source, query, plan, PAGE_SIZE)
}

impl<'a, S: IssueSource + ?Sized> Paginator<'a, S> {
    pub fn new(source: &'a S, query: &'a str, plan: &'a RequestPlan, page_size: usize) -> Self {
        Self {
            source,
            query,
            plan,
            page_size: page_size.max(1),
            offset: 0,
            page: Vec::new().into_iter(),
            done: false,
        }
    }
}

impl<S: IssueSource + ?Sized> Iterator for Paginator<'_, S> {
    type Item = Result<Value, JiraError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.page.next() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }

            match self
                .source
                .search(self.query, self.plan, self.offset, self.page_size)
            {
                Ok(page) if page.is_empty() => {
                    logging::debug(format!(
                        "search exhausted at offset {} page_size {}",
                        self.offset, self.page_size
                    ));
                    self.done = true;
                    return None;
                }
                Ok(page) => {
                    logging::debug(format!(
                        "search page offset={} records={}",
                        self.offset,
                        page.len()
                    ));
                    self.offset += self.page_size;
                    self.page = page.into_iter();
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    /// In-memory source that serves fixed pages and records every call.
    #[derive(Debug, Default)]
    pub struct FakeSource {
        pub records: Vec<Value>,
        pub sub_resources: HashMap<(String, &'static str), Vec<Value>>,
        pub fail_search_at: Option<usize>,
        pub fail_sub_fetch_for: Option<String>,
        pub searches: RefCell<Vec<(usize, usize, String, String)>>,
        pub sub_fetches: RefCell<Vec<(String, SubResource)>>,
    }

    impl FakeSource {
        pub fn with_records(records: Vec<Value>) -> Self {
            Self {
                records,
                ..Self::default()
            }
        }

        pub fn with_sub_resource(
            mut self,
            issue_key: &str,
            kind: SubResource,
            entries: Vec<Value>,
        ) -> Self {
            self.sub_resources
                .insert((issue_key.to_string(), kind_name(kind)), entries);
            self
        }
    }

    fn kind_name(kind: SubResource) -> &'static str {
        match kind {
            SubResource::Worklogs => "worklogs",
            SubResource::SlaOverview => "sla",
        }
    }

    impl IssueSource for FakeSource {
        fn search(
            &self,
            _query: &str,
            plan: &RequestPlan,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<Value>, JiraError> {
            self.searches.borrow_mut().push((
                offset,
                limit,
                plan.fields_param(),
                plan.expand_param(),
            ));
            if self.fail_search_at == Some(offset) {
                return Err(JiraError::Http {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                    body: "upstream down".into(),
                });
            }
            Ok(self
                .records
                .iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect())
        }

        fn fetch_sub_resource(
            &self,
            issue_key: &str,
            kind: SubResource,
        ) -> Result<Vec<Value>, JiraError> {
            self.sub_fetches
                .borrow_mut()
                .push((issue_key.to_string(), kind));
            if self.fail_sub_fetch_for.as_deref() == Some(issue_key) {
                return Err(JiraError::Http {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                    body: "sub-resource unavailable".into(),
                });
            }
            Ok(self
                .sub_resources
                .get(&(issue_key.to_string(), kind_name(kind)))
                .cloned()
                .unwrap_or_default())
        }
    }
}
