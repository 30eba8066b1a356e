//! Fixtures shared by the unit tests.

use mongodb::bson::oid::ObjectId;

use crate::store::UserStore;
use crate::store::memory::MemoryStore;
use crate::types::User;

pub fn user(username: &str) -> User {
    User {
        id: ObjectId::new(),
        username: username.to_string(),
        password: "not-a-real-hash".to_string(),
        first_name: username.to_string(),
        last_name: "tester".to_string(),
        email: format!("{username}@example.com"),
        courses: Vec::new(),
        friends: Vec::new(),
        groups: Vec::new(),
        tokens: Vec::new(),
    }
}

pub async fn seed_users(store: &MemoryStore, usernames: &[&str]) -> Vec<User> {
    let mut users = Vec::with_capacity(usernames.len());
    for name in usernames {
        let user = user(name);
        store.insert_user(&user).await.expect("seed user");
        users.push(user);
    }
    users
}
