use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use super::user::{PresenceRow, User, UserId};

/// Read-through cache of user profiles and their online state.
/// The online set only changes through presence rows from the backend.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    users: HashMap<UserId, User>,
    online: BTreeSet<UserId>,
}

impl PresenceTracker {
    pub fn set_users(&mut self, users: Vec<User>) {
        self.online = users
            .iter()
            .filter(|user| user.is_online)
            .map(|user| user.id.clone())
            .collect();
        self.users = users
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();
    }

    pub fn remember(&mut self, user: User) {
        if user.is_online {
            self.online.insert(user.id.clone());
        }
        self.users.entry(user.id.clone()).or_insert(user);
    }

    pub fn user(&self, user_id: &str) -> Option<&User> {
        self.users.get(user_id)
    }

    pub fn apply(&mut self, row: &PresenceRow) {
        if row.is_online {
            self.online.insert(row.user_id.clone());
        } else {
            self.online.remove(&row.user_id);
        }

        if let Some(user) = self.users.get_mut(&row.user_id) {
            user.is_online = row.is_online;
            user.last_seen = Some(row.last_seen);
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.online.contains(user_id)
    }

    #[cfg(test)]
    pub fn online_users(&self) -> impl Iterator<Item = &UserId> {
        self.online.iter()
    }

    pub fn last_seen(&self, user_id: &str) -> Option<DateTime<Utc>> {
        self.users.get(user_id).and_then(|user| user.last_seen)
    }

    pub fn last_seen_label(&self, user_id: &str, now: DateTime<Utc>) -> String {
        if self.is_online(user_id) {
            return "online".to_owned();
        }

        match self.last_seen(user_id) {
            Some(seen) => format!("last seen {}", relative_age(seen, now)),
            None => "last seen unknown".to_owned(),
        }
    }
}

fn relative_age(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let minutes = elapsed.num_minutes();

    match minutes {
        i64::MIN..=0 => "just now".to_owned(),
        1 => "1 minute ago".to_owned(),
        2..=59 => format!("{minutes} minutes ago"),
        _ => match elapsed.num_hours() {
            1 => "1 hour ago".to_owned(),
            hours @ 2..=23 => format!("{hours} hours ago"),
            _ => match elapsed.num_days() {
                1 => "1 day ago".to_owned(),
                days => format!("{days} days ago"),
            },
        },
    }
}
