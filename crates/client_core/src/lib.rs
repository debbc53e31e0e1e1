use std::{
    collections::HashSet,
    sync::{Arc, Weak},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{Post, PostDraft, PostId, DEFAULT_USER_ID},
    error::{EngineError, GatewayError, StoreError},
    protocol::CreatePostRequest,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

pub mod filter;
pub mod session;
pub mod store;

pub use filter::{filter_posts, CollectionView};
pub use session::{Notification, NotificationKind, SessionSnapshot};
pub use store::PostStore;

/// How many posts of the remote baseline are kept after a refresh. The demo
/// backend returns the full collection in one response; keeping a bounded
/// page is this client's policy, not a transport feature.
pub const DEFAULT_PAGE_SIZE: usize = 20;
/// How long a notification stays visible unless replaced or dismissed first.
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

#[async_trait]
pub trait PostGateway: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Post>, GatewayError>;
    async fn create(&self, draft: &PostDraft) -> Result<Post, GatewayError>;
    async fn update(&self, post: &Post) -> Result<Post, GatewayError>;
    async fn delete(&self, id: PostId) -> Result<(), GatewayError>;
}

/// Gateway over the `/posts` REST resource. One round trip per call, no
/// implicit retry; every failure is classified before it leaves this type.
pub struct RestPostGateway {
    http: Client,
    base_url: String,
}

impl RestPostGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn posts_url(&self) -> String {
        format!("{}/posts", self.base_url)
    }

    fn post_url(&self, id: PostId) -> String {
        format!("{}/posts/{}", self.base_url, id.0)
    }
}

fn classify(err: reqwest::Error) -> GatewayError {
    if let Some(status) = err.status() {
        return GatewayError::Http {
            status: status.as_u16(),
        };
    }
    if err.is_decode() {
        return GatewayError::Decode(err.to_string());
    }
    GatewayError::Network(err.to_string())
}

#[async_trait]
impl PostGateway for RestPostGateway {
    async fn fetch_all(&self) -> Result<Vec<Post>, GatewayError> {
        let posts = self
            .http
            .get(self.posts_url())
            .send()
            .await
            .map_err(classify)?
            .error_for_status()
            .map_err(classify)?
            .json()
            .await
            .map_err(classify)?;
        Ok(posts)
    }

    async fn create(&self, draft: &PostDraft) -> Result<Post, GatewayError> {
        // The server's echo is returned verbatim, fake id included; minting
        // a usable id is the engine's job.
        let created = self
            .http
            .post(self.posts_url())
            .json(&CreatePostRequest::from(draft))
            .send()
            .await
            .map_err(classify)?
            .error_for_status()
            .map_err(classify)?
            .json()
            .await
            .map_err(classify)?;
        Ok(created)
    }

    async fn update(&self, post: &Post) -> Result<Post, GatewayError> {
        let updated = self
            .http
            .put(self.post_url(post.id))
            .json(post)
            .send()
            .await
            .map_err(classify)?
            .error_for_status()
            .map_err(classify)?
            .json()
            .await
            .map_err(classify)?;
        Ok(updated)
    }

    async fn delete(&self, id: PostId) -> Result<(), GatewayError> {
        self.http
            .delete(self.post_url(id))
            .send()
            .await
            .map_err(classify)?
            .error_for_status()
            .map_err(classify)?;
        Ok(())
    }
}

/// What an operation acts on. At most one operation may be in flight per
/// target: an update and a delete for the same id exclude each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationTarget {
    NewPost,
    Existing(PostId),
}

#[derive(Debug, Clone)]
pub enum EngineEvent {
    CollectionChanged,
    SessionChanged,
    NotificationChanged(Option<Notification>),
}

struct EngineState {
    store: PostStore,
    search_query: String,
    create_open: bool,
    editing: Option<Post>,
    pending_deletion: Option<PostId>,
    in_flight: HashSet<OperationTarget>,
    locally_mutated: bool,
    next_local_id: i64,
    notification: Option<Notification>,
    notification_timer: Option<JoinHandle<()>>,
}

impl EngineState {
    fn new() -> Self {
        Self {
            store: PostStore::new(),
            search_query: String::new(),
            create_open: false,
            editing: None,
            pending_deletion: None,
            in_flight: HashSet::new(),
            locally_mutated: false,
            next_local_id: 1,
            notification: None,
            notification_timer: None,
        }
    }

    /// Mints an id the store has never seen. The candidate counter only
    /// moves forward, so a collision (a fetched baseline that already used
    /// the candidate) just advances it.
    fn mint_post_id(&mut self) -> PostId {
        loop {
            let candidate = PostId(self.next_local_id);
            self.next_local_id += 1;
            if self.store.get(candidate).is_none() {
                return candidate;
            }
        }
    }
}

/// Owns the canonical collection and all transient view state, issues remote
/// operations through the gateway, and reconciles their results. Observers
/// subscribe to [`EngineEvent`]s and re-read snapshots; they never mutate.
pub struct PostsEngine {
    gateway: Arc<dyn PostGateway>,
    page_size: usize,
    inner: Mutex<EngineState>,
    events: broadcast::Sender<EngineEvent>,
}

impl PostsEngine {
    pub fn new(gateway: Arc<dyn PostGateway>) -> Arc<Self> {
        Self::with_page_size(gateway, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(gateway: Arc<dyn PostGateway>, page_size: usize) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            gateway,
            page_size,
            inner: Mutex::new(EngineState::new()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Fetches the remote baseline and installs it, bounded to the page
    /// size and with duplicate ids dropped. Once any local create, update,
    /// or delete has settled successfully, later baselines are discarded:
    /// the demo backend never persists writes, so a fetched baseline can
    /// only clobber the user's changes. Returns the collection size after
    /// the call.
    pub async fn refresh(self: &Arc<Self>) -> Result<usize, EngineError> {
        let fetched = match self.gateway.fetch_all().await {
            Ok(posts) => posts,
            Err(err) => {
                warn!("posts: baseline fetch failed: {err}");
                self.notify(format!("Failed to load posts: {err}"), NotificationKind::Error)
                    .await;
                return Err(err.into());
            }
        };

        let mut baseline = Vec::new();
        let mut seen = HashSet::new();
        for post in fetched {
            if baseline.len() == self.page_size {
                break;
            }
            if seen.insert(post.id) {
                baseline.push(post);
            }
        }

        let (applied, size) = {
            let mut inner = self.inner.lock().await;
            if inner.locally_mutated {
                info!(
                    kept = inner.store.len(),
                    "posts: baseline discarded, local changes take precedence"
                );
                (false, inner.store.len())
            } else {
                inner.store.load(baseline);
                // Seed the id allocator above everything the server handed us.
                let next_free = inner.store.max_id().map_or(1, |id| id.0 + 1);
                inner.next_local_id = inner.next_local_id.max(next_free);
                (true, inner.store.len())
            }
        };

        if applied {
            info!(count = size, "posts: baseline loaded");
            let _ = self.events.send(EngineEvent::CollectionChanged);
        }
        Ok(size)
    }

    pub async fn open_create(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.create_open = true;
        }
        let _ = self.events.send(EngineEvent::SessionChanged);
    }

    /// Closes the create dialog. An in-flight create is not aborted; its
    /// result still applies to the store when it settles.
    pub async fn cancel_create(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.create_open = false;
        }
        let _ = self.events.send(EngineEvent::SessionChanged);
    }

    pub async fn submit_create(
        self: &Arc<Self>,
        title: &str,
        body: &str,
    ) -> Result<Post, EngineError> {
        let (title, body) = validate_fields(title, body)?;

        {
            let mut inner = self.inner.lock().await;
            if !inner.in_flight.insert(OperationTarget::NewPost) {
                return Err(EngineError::OperationInFlight);
            }
            inner.create_open = true;
        }
        let _ = self.events.send(EngineEvent::SessionChanged);

        let draft = PostDraft {
            title,
            body,
            user_id: DEFAULT_USER_ID,
        };
        let outcome = self.gateway.create(&draft).await;

        let settled = {
            let mut inner = self.inner.lock().await;
            inner.in_flight.remove(&OperationTarget::NewPost);
            match outcome {
                Ok(mut created) => {
                    created.id = inner.mint_post_id();
                    // Cannot collide after minting, but the store still has
                    // the last word on uniqueness.
                    inner.store.insert(created.clone())?;
                    inner.create_open = false;
                    inner.locally_mutated = true;
                    Ok(created)
                }
                Err(err) => Err(EngineError::from(err)),
            }
        };

        match settled {
            Ok(created) => {
                info!(post_id = created.id.0, "posts: created");
                let _ = self.events.send(EngineEvent::CollectionChanged);
                let _ = self.events.send(EngineEvent::SessionChanged);
                self.notify("Post created successfully", NotificationKind::Success)
                    .await;
                Ok(created)
            }
            Err(err) => {
                warn!("posts: create failed: {err}");
                let _ = self.events.send(EngineEvent::SessionChanged);
                self.notify(
                    format!("Failed to create post: {err}"),
                    NotificationKind::Error,
                )
                .await;
                Err(err)
            }
        }
    }

    /// Snapshots the post into the session so the edit dialog always starts
    /// from the store's current copy.
    pub async fn begin_edit(&self, id: PostId) -> Result<Post, EngineError> {
        let post = {
            let mut inner = self.inner.lock().await;
            let post = inner
                .store
                .get(id)
                .cloned()
                .ok_or(StoreError::NotFound { id: id.0 })?;
            inner.editing = Some(post.clone());
            post
        };
        let _ = self.events.send(EngineEvent::SessionChanged);
        Ok(post)
    }

    pub async fn cancel_edit(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.editing = None;
        }
        let _ = self.events.send(EngineEvent::SessionChanged);
    }

    pub async fn submit_edit(
        self: &Arc<Self>,
        title: &str,
        body: &str,
    ) -> Result<Post, EngineError> {
        let (title, body) = validate_fields(title, body)?;

        let original = {
            let mut inner = self.inner.lock().await;
            let Some(original) = inner.editing.clone() else {
                return Err(EngineError::NoActiveEdit);
            };
            if !inner.in_flight.insert(OperationTarget::Existing(original.id)) {
                return Err(EngineError::OperationInFlight);
            }
            original
        };
        let _ = self.events.send(EngineEvent::SessionChanged);

        // Full replacement record; id and author come from the snapshot.
        let merged = Post {
            id: original.id,
            title,
            body,
            user_id: original.user_id,
        };
        let outcome = self.gateway.update(&merged).await;

        let settled = {
            let mut inner = self.inner.lock().await;
            inner.in_flight.remove(&OperationTarget::Existing(original.id));
            match outcome {
                Ok(updated) => match inner.store.replace(updated.clone()) {
                    Ok(()) => {
                        inner.editing = None;
                        inner.locally_mutated = true;
                        Ok(updated)
                    }
                    Err(err) => Err(EngineError::from(err)),
                },
                Err(err) => Err(EngineError::from(err)),
            }
        };

        match settled {
            Ok(updated) => {
                info!(post_id = updated.id.0, "posts: updated");
                let _ = self.events.send(EngineEvent::CollectionChanged);
                let _ = self.events.send(EngineEvent::SessionChanged);
                self.notify("Post updated successfully", NotificationKind::Success)
                    .await;
                Ok(updated)
            }
            Err(err) => {
                warn!(post_id = original.id.0, "posts: update failed: {err}");
                let _ = self.events.send(EngineEvent::SessionChanged);
                self.notify(
                    format!("Failed to update post: {err}"),
                    NotificationKind::Error,
                )
                .await;
                Err(err)
            }
        }
    }

    /// Opens the confirmation step; nothing is sent until
    /// [`confirm_delete`](Self::confirm_delete).
    pub async fn request_delete(&self, id: PostId) -> Result<(), EngineError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.store.get(id).is_none() {
                return Err(StoreError::NotFound { id: id.0 }.into());
            }
            inner.pending_deletion = Some(id);
        }
        let _ = self.events.send(EngineEvent::SessionChanged);
        Ok(())
    }

    pub async fn cancel_delete(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.pending_deletion = None;
        }
        let _ = self.events.send(EngineEvent::SessionChanged);
    }

    /// Sends the delete and removes the entity only after the server
    /// acknowledges. The store is never touched optimistically here: once an
    /// entry leaves the view there is no recovery path.
    pub async fn confirm_delete(self: &Arc<Self>) -> Result<(), EngineError> {
        let id = {
            let mut inner = self.inner.lock().await;
            let Some(id) = inner.pending_deletion else {
                return Err(EngineError::NoPendingDeletion);
            };
            if !inner.in_flight.insert(OperationTarget::Existing(id)) {
                return Err(EngineError::OperationInFlight);
            }
            inner.pending_deletion = None;
            id
        };
        let _ = self.events.send(EngineEvent::SessionChanged);

        let outcome = self.gateway.delete(id).await;

        let settled = {
            let mut inner = self.inner.lock().await;
            inner.in_flight.remove(&OperationTarget::Existing(id));
            match outcome {
                Ok(()) => {
                    if let Err(StoreError::NotFound { .. }) = inner.store.remove(id) {
                        // The entry already left the store by another path;
                        // a late acknowledgement is not an error.
                        warn!(post_id = id.0, "posts: delete settled for an absent id");
                    }
                    inner.locally_mutated = true;
                    Ok(())
                }
                Err(err) => Err(EngineError::from(err)),
            }
        };

        match settled {
            Ok(()) => {
                info!(post_id = id.0, "posts: deleted");
                let _ = self.events.send(EngineEvent::CollectionChanged);
                let _ = self.events.send(EngineEvent::SessionChanged);
                self.notify("Post deleted successfully", NotificationKind::Success)
                    .await;
                Ok(())
            }
            Err(err) => {
                warn!(post_id = id.0, "posts: delete failed: {err}");
                let _ = self.events.send(EngineEvent::SessionChanged);
                self.notify(
                    format!("Failed to delete post: {err}"),
                    NotificationKind::Error,
                )
                .await;
                Err(err)
            }
        }
    }

    pub async fn set_search_query(&self, query: impl Into<String>) {
        {
            let mut inner = self.inner.lock().await;
            inner.search_query = query.into();
        }
        let _ = self.events.send(EngineEvent::SessionChanged);
    }

    pub async fn clear_search(&self) {
        self.set_search_query("").await;
    }

    /// Derives the view from the live store; always consistent with the
    /// latest applied mutation.
    pub async fn visible_posts(&self) -> CollectionView {
        let inner = self.inner.lock().await;
        CollectionView {
            posts: filter_posts(inner.store.posts(), &inner.search_query),
            total: inner.store.len(),
            query: inner.search_query.clone(),
        }
    }

    pub async fn session(&self) -> SessionSnapshot {
        let inner = self.inner.lock().await;
        SessionSnapshot {
            create_open: inner.create_open,
            editing: inner.editing.clone(),
            pending_deletion: inner.pending_deletion,
            search_query: inner.search_query.clone(),
            notification: inner.notification.clone(),
        }
    }

    /// Authoritative in-flight flag for the submit affordances; UI disabling
    /// mirrors this, the contract does not depend on it.
    pub async fn is_in_flight(&self, target: OperationTarget) -> bool {
        self.inner.lock().await.in_flight.contains(&target)
    }

    pub async fn notify(self: &Arc<Self>, text: impl Into<String>, kind: NotificationKind) {
        self.notify_with_ttl(text, kind, NOTIFICATION_TTL).await;
    }

    /// Replaces the visible notification and restarts the expiry clock. The
    /// incumbent's timer is aborted before the new one starts, so a stale
    /// timer can never clear a newer message.
    pub async fn notify_with_ttl(
        self: &Arc<Self>,
        text: impl Into<String>,
        kind: NotificationKind,
        ttl: Duration,
    ) {
        let notification = Notification {
            text: text.into(),
            kind,
        };
        {
            let mut inner = self.inner.lock().await;
            if let Some(timer) = inner.notification_timer.take() {
                timer.abort();
            }
            inner.notification = Some(notification.clone());
            let engine = Arc::downgrade(self);
            inner.notification_timer = Some(tokio::spawn(expire_after(engine, ttl)));
        }
        let _ = self
            .events
            .send(EngineEvent::NotificationChanged(Some(notification)));
    }

    /// Manual dismissal; also cancels the pending expiry timer.
    pub async fn dismiss_notification(&self) {
        let cleared = {
            let mut inner = self.inner.lock().await;
            if let Some(timer) = inner.notification_timer.take() {
                timer.abort();
            }
            inner.notification.take().is_some()
        };
        if cleared {
            let _ = self.events.send(EngineEvent::NotificationChanged(None));
        }
    }

    async fn expire_notification(&self) {
        let cleared = {
            let mut inner = self.inner.lock().await;
            inner.notification_timer = None;
            inner.notification.take().is_some()
        };
        if cleared {
            let _ = self.events.send(EngineEvent::NotificationChanged(None));
        }
    }
}

impl Drop for PostsEngine {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.get_mut().notification_timer.take() {
            timer.abort();
        }
    }
}

async fn expire_after(engine: Weak<PostsEngine>, ttl: Duration) {
    tokio::time::sleep(ttl).await;
    if let Some(engine) = engine.upgrade() {
        engine.expire_notification().await;
    }
}

fn validate_fields(title: &str, body: &str) -> Result<(String, String), EngineError> {
    let title = title.trim();
    let body = body.trim();
    if title.is_empty() {
        return Err(EngineError::Validation { field: "title" });
    }
    if body.is_empty() {
        return Err(EngineError::Validation { field: "body" });
    }
    Ok((title.to_string(), body.to_string()))
}
