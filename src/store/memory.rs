//! In-process [`CredentialStore`] for tests and local runs.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    Account, AccountUpdate, ChannelProfile, CreateOutcome, CredentialStore, NewAccount,
    UpdateOutcome, VideoOwner, WatchedVideo,
};

/// Video metadata as seeded into the memory store.
#[derive(Clone, Debug)]
pub struct VideoRecord {
    pub id: Uuid,
    pub owner: Uuid,
    pub video_file: String,
    pub thumbnail: String,
    pub title: String,
    pub description: String,
    pub duration: f64,
    pub views: i64,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<Uuid, Account>,
    videos: HashMap<Uuid, VideoRecord>,
    /// (subscriber, channel)
    subscriptions: Vec<(Uuid, Uuid)>,
    history: HashMap<Uuid, Vec<Uuid>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_video(&self, video: VideoRecord) {
        self.inner.lock().await.videos.insert(video.id, video);
    }

    pub async fn add_subscription(&self, subscriber: Uuid, channel: Uuid) {
        let mut inner = self.inner.lock().await;
        if !inner.subscriptions.contains(&(subscriber, channel)) {
            inner.subscriptions.push((subscriber, channel));
        }
    }

    pub async fn push_watch_history(&self, account: Uuid, video: Uuid) {
        self.inner
            .lock()
            .await
            .history
            .entry(account)
            .or_default()
            .push(video);
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<Account>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .values()
            .find(|account| account.username == username || account.email == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .values()
            .find(|account| account.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .accounts
            .values()
            .find(|account| account.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.inner.lock().await.accounts.get(&id).cloned())
    }

    async fn create(&self, account: NewAccount) -> Result<CreateOutcome> {
        let mut inner = self.inner.lock().await;
        let taken = inner
            .accounts
            .values()
            .any(|existing| {
                existing.username == account.username || existing.email == account.email
            });
        if taken {
            return Ok(CreateOutcome::Conflict);
        }

        let now = Utc::now();
        let record = Account {
            id: Uuid::now_v7(),
            username: account.username,
            email: account.email,
            full_name: account.full_name,
            avatar: account.avatar,
            cover_image: account.cover_image,
            password_hash: account.password_hash,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        inner.accounts.insert(record.id, record.clone());
        Ok(CreateOutcome::Created(record))
    }

    async fn update(&self, id: Uuid, update: AccountUpdate) -> Result<UpdateOutcome> {
        let mut inner = self.inner.lock().await;
        if let Some(email) = update.email.as_deref() {
            let taken = inner
                .accounts
                .values()
                .any(|other| other.id != id && other.email == email);
            if taken {
                return Ok(UpdateOutcome::Conflict);
            }
        }

        let Some(account) = inner.accounts.get_mut(&id) else {
            return Ok(UpdateOutcome::NotFound);
        };
        if let Some(full_name) = update.full_name {
            account.full_name = full_name;
        }
        if let Some(email) = update.email {
            account.email = email;
        }
        if let Some(password_hash) = update.password_hash {
            account.password_hash = password_hash;
        }
        if let Some(avatar) = update.avatar {
            account.avatar = avatar;
        }
        if let Some(cover_image) = update.cover_image {
            account.cover_image = Some(cover_image);
        }
        if let Some(refresh_token) = update.refresh_token {
            account.refresh_token = refresh_token;
        }
        account.updated_at = Utc::now();
        Ok(UpdateOutcome::Updated(account.clone()))
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let Some(account) = inner.accounts.get_mut(&id) else {
            return Ok(false);
        };
        if account.refresh_token.as_deref() != Some(expected) {
            return Ok(false);
        }
        account.refresh_token = Some(replacement.to_string());
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn channel_profile(
        &self,
        username: &str,
        viewer: Option<Uuid>,
    ) -> Result<Option<ChannelProfile>> {
        let inner = self.inner.lock().await;
        let Some(channel) = inner
            .accounts
            .values()
            .find(|account| account.username == username)
        else {
            return Ok(None);
        };

        let subscribers_count = inner
            .subscriptions
            .iter()
            .filter(|(_, target)| *target == channel.id)
            .count();
        let channels_subscribed_to_count = inner
            .subscriptions
            .iter()
            .filter(|(subscriber, _)| *subscriber == channel.id)
            .count();
        let is_subscribed = viewer.is_some_and(|viewer| {
            inner.subscriptions.contains(&(viewer, channel.id))
        });

        let public = channel.public();
        Ok(Some(ChannelProfile {
            full_name: public.full_name,
            username: public.username,
            email: public.email,
            avatar: public.avatar,
            cover_image: public.cover_image,
            created_at: public.created_at,
            subscribers_count: i64::try_from(subscribers_count)?,
            channels_subscribed_to_count: i64::try_from(channels_subscribed_to_count)?,
            is_subscribed,
        }))
    }

    async fn watch_history(&self, id: Uuid) -> Result<Vec<WatchedVideo>> {
        let inner = self.inner.lock().await;
        let Some(history) = inner.history.get(&id) else {
            return Ok(Vec::new());
        };

        // Videos or owners that no longer exist drop out of the history.
        Ok(history
            .iter()
            .filter_map(|video_id| {
                let video = inner.videos.get(video_id)?;
                let owner = inner.accounts.get(&video.owner)?;
                Some(WatchedVideo {
                    id: video.id,
                    video_file: video.video_file.clone(),
                    thumbnail: video.thumbnail.clone(),
                    title: video.title.clone(),
                    description: video.description.clone(),
                    duration: video.duration,
                    views: video.views,
                    is_published: video.is_published,
                    created_at: video.created_at,
                    owner: VideoOwner {
                        full_name: owner.full_name.clone(),
                        username: owner.username.clone(),
                        avatar: owner.avatar.url.clone(),
                    },
                })
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Asset;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            full_name: format!("{username} full"),
            password_hash: "digest".to_string(),
            avatar: Asset {
                url: format!("https://media.test/{username}.png"),
                id: username.to_string(),
            },
            cover_image: None,
        }
    }

    async fn created(store: &MemoryStore, username: &str, email: &str) -> Result<Account> {
        match store.create(new_account(username, email)).await? {
            CreateOutcome::Created(account) => Ok(account),
            CreateOutcome::Conflict => anyhow::bail!("unexpected conflict"),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_username_or_email() -> Result<()> {
        let store = MemoryStore::new();
        created(&store, "alice", "alice@x.com").await?;

        let outcome = store.create(new_account("alice", "other@x.com")).await?;
        assert!(matches!(outcome, CreateOutcome::Conflict));
        let outcome = store.create(new_account("bob", "alice@x.com")).await?;
        assert!(matches!(outcome, CreateOutcome::Conflict));
        Ok(())
    }

    #[tokio::test]
    async fn find_by_username_or_email_matches_either() -> Result<()> {
        let store = MemoryStore::new();
        let alice = created(&store, "alice", "alice@x.com").await?;

        let by_name = store.find_by_username_or_email("alice", "nope").await?;
        assert_eq!(by_name.map(|a| a.id), Some(alice.id));
        let by_email = store
            .find_by_username_or_email("alice@x.com", "alice@x.com")
            .await?;
        assert_eq!(by_email.map(|a| a.id), Some(alice.id));
        assert!(store.find_by_username_or_email("bob", "bob@x.com").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn single_column_lookups_do_not_cross_match() -> Result<()> {
        let store = MemoryStore::new();
        let alice = created(&store, "alice", "alice@x.com").await?;
        // Stores accept whatever they are given; format rules live upstream.
        let lookalike = created(&store, "alice@x.com", "mallory@x.com").await?;

        let by_email = store.find_by_email("alice@x.com").await?;
        assert_eq!(by_email.map(|a| a.id), Some(alice.id));
        let by_name = store.find_by_username("alice@x.com").await?;
        assert_eq!(by_name.map(|a| a.id), Some(lookalike.id));
        assert!(store.find_by_username("mallory@x.com").await?.is_none());
        assert!(store.find_by_email("alice").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn swap_refresh_token_is_conditional() -> Result<()> {
        let store = MemoryStore::new();
        let alice = created(&store, "alice", "alice@x.com").await?;

        // Nothing stored yet, so nothing can match.
        assert!(!store.swap_refresh_token(alice.id, "a", "b").await?);

        store
            .update(
                alice.id,
                AccountUpdate {
                    refresh_token: Some(Some("a".to_string())),
                    ..AccountUpdate::default()
                },
            )
            .await?;
        assert!(store.swap_refresh_token(alice.id, "a", "b").await?);
        assert!(!store.swap_refresh_token(alice.id, "a", "c").await?);

        let stored = store.find_by_id(alice.id).await?.map(|a| a.refresh_token);
        assert_eq!(stored, Some(Some("b".to_string())));
        Ok(())
    }

    #[tokio::test]
    async fn update_email_conflict() -> Result<()> {
        let store = MemoryStore::new();
        let alice = created(&store, "alice", "alice@x.com").await?;
        created(&store, "bob", "bob@x.com").await?;

        let outcome = store
            .update(
                alice.id,
                AccountUpdate {
                    email: Some("bob@x.com".to_string()),
                    ..AccountUpdate::default()
                },
            )
            .await?;
        assert!(matches!(outcome, UpdateOutcome::Conflict));

        let outcome = store
            .update(Uuid::now_v7(), AccountUpdate::default())
            .await?;
        assert!(matches!(outcome, UpdateOutcome::NotFound));
        Ok(())
    }

    #[tokio::test]
    async fn channel_profile_counts_subscriptions() -> Result<()> {
        let store = MemoryStore::new();
        let alice = created(&store, "alice", "alice@x.com").await?;
        let bob = created(&store, "bob", "bob@x.com").await?;
        let carol = created(&store, "carol", "carol@x.com").await?;

        store.add_subscription(bob.id, alice.id).await;
        store.add_subscription(carol.id, alice.id).await;
        store.add_subscription(alice.id, carol.id).await;
        // duplicate subscriptions are ignored
        store.add_subscription(bob.id, alice.id).await;

        let Some(profile) = store.channel_profile("alice", Some(bob.id)).await? else {
            anyhow::bail!("missing profile");
        };
        assert_eq!(profile.subscribers_count, 2);
        assert_eq!(profile.channels_subscribed_to_count, 1);
        assert!(profile.is_subscribed);

        let Some(anonymous) = store.channel_profile("alice", None).await? else {
            anyhow::bail!("missing profile");
        };
        assert!(!anonymous.is_subscribed);
        assert!(store.channel_profile("nobody", None).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn watch_history_keeps_order_and_owner() -> Result<()> {
        let store = MemoryStore::new();
        let alice = created(&store, "alice", "alice@x.com").await?;
        let bob = created(&store, "bob", "bob@x.com").await?;

        let mut ids = Vec::new();
        for title in ["first", "second"] {
            let video = VideoRecord {
                id: Uuid::now_v7(),
                owner: bob.id,
                video_file: format!("https://media.test/{title}.mp4"),
                thumbnail: format!("https://media.test/{title}.jpg"),
                title: title.to_string(),
                description: String::new(),
                duration: 12.5,
                views: 0,
                is_published: true,
                created_at: Utc::now(),
            };
            ids.push(video.id);
            store.add_video(video).await;
        }
        store.push_watch_history(alice.id, ids[1]).await;
        store.push_watch_history(alice.id, ids[0]).await;

        let history = store.watch_history(alice.id).await?;
        let titles: Vec<_> = history.iter().map(|v| v.title.as_str()).collect();
        assert_eq!(titles, ["second", "first"]);
        assert_eq!(history[0].owner.username, "bob");
        assert!(store.watch_history(bob.id).await?.is_empty());
        Ok(())
    }
}
