use crate::platform::types;

/// Map octocrab Issue to our platform Issue type.
pub fn map_issue(issue: &octocrab::models::issues::Issue) -> types::Issue {
    types::Issue {
        number: issue.number,
        title: issue.title.clone(),
        body: issue.body.clone().unwrap_or_default(),
        labels: issue.labels.iter().map(|l| l.name.clone()).collect(),
        is_pull_request: issue.pull_request.is_some(),
    }
}
