use std::collections::HashSet;

use shared::{
    domain::{Post, PostId},
    error::StoreError,
};

/// Canonical copy of the post collection. Mutated only by the engine;
/// everything else reads projections of it.
#[derive(Debug, Clone, Default)]
pub struct PostStore {
    posts: Vec<Post>,
}

impl PostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole collection. Callers must hand in a sequence with
    /// unique ids; the store does not repair a malformed baseline.
    pub fn load(&mut self, posts: Vec<Post>) {
        debug_assert!(
            {
                let mut seen = HashSet::new();
                posts.iter().all(|post| seen.insert(post.id))
            },
            "load requires unique post ids"
        );
        self.posts = posts;
    }

    /// Prepends one post so the newest entry surfaces first.
    pub fn insert(&mut self, post: Post) -> Result<(), StoreError> {
        if self.get(post.id).is_some() {
            return Err(StoreError::DuplicateId { id: post.id.0 });
        }
        self.posts.insert(0, post);
        Ok(())
    }

    pub fn replace(&mut self, post: Post) -> Result<(), StoreError> {
        match self.posts.iter_mut().find(|existing| existing.id == post.id) {
            Some(slot) => {
                *slot = post;
                Ok(())
            }
            None => Err(StoreError::NotFound { id: post.id.0 }),
        }
    }

    pub fn remove(&mut self, id: PostId) -> Result<(), StoreError> {
        match self.posts.iter().position(|post| post.id == id) {
            Some(index) => {
                self.posts.remove(index);
                Ok(())
            }
            None => Err(StoreError::NotFound { id: id.0 }),
        }
    }

    pub fn get(&self, id: PostId) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == id)
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn max_id(&self) -> Option<PostId> {
        self.posts.iter().map(|post| post.id).max()
    }
}
