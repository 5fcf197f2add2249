#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: Option<i64>,
    pub user_id: i64,
    pub name: String,
}

impl Category {
    pub fn new(user_id: i64, name: String) -> Self {
        Self {
            id: None,
            user_id,
            name,
        }
    }

    /// Find a category by ID in a slice.
    pub fn find_by_id(categories: &[Category], id: i64) -> Option<&Category> {
        categories.iter().find(|c| c.id == Some(id))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
