use shared::domain::Post;

/// Ordered projection of the store for one query, plus the counts the
/// "Showing X of Y" surface renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionView {
    pub posts: Vec<Post>,
    pub total: usize,
    pub query: String,
}

impl CollectionView {
    pub fn visible(&self) -> usize {
        self.posts.len()
    }
}

/// Case-insensitive substring match on title or body, order preserved. A
/// blank query keeps the full sequence. Never mutates its inputs.
pub fn filter_posts(posts: &[Post], query: &str) -> Vec<Post> {
    if query.trim().is_empty() {
        return posts.to_vec();
    }
    let needle = query.to_lowercase();
    posts
        .iter()
        .filter(|post| {
            post.title.to_lowercase().contains(&needle)
                || post.body.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}
