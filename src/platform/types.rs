#[derive(Debug, Clone)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    /// GitHub serves pull requests through the issues endpoint too.
    pub is_pull_request: bool,
}
