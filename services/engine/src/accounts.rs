//! Account registry access
//!
//! The engine only reads balance, limit and the offline/hold flags to decide
//! eligibility and derive per-account caps. Account CRUD lives outside the
//! engine; the mock provider stands in for the dashboard's account tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub platform: String,
    pub balance: f64,
    /// Per-account stake ceiling; `None` means unbounded.
    pub limit: Option<f64>,
    pub phone_offline: bool,
    pub on_hold: bool,
    pub tags: Vec<String>,
}

impl Account {
    /// Hard ceiling for a single stake on this account: the balance, further
    /// capped by the limit when one is set. Never negative.
    pub fn max_bet(&self) -> f64 {
        let cap = match self.limit {
            Some(limit) => self.balance.min(limit),
            None => self.balance,
        };
        cap.max(0.0)
    }

    /// Offline or held accounts are never eligible, nor are accounts with no
    /// headroom at all.
    pub fn is_eligible(&self) -> bool {
        !self.phone_offline && !self.on_hold && self.max_bet() > 0.0
    }
}

pub trait AccountProvider: Send + Sync {
    fn platforms(&self) -> Vec<String>;

    fn accounts_for(&self, platform: &str) -> Vec<Account>;

    fn eligible_accounts(&self, platform: &str) -> Vec<Account> {
        self.accounts_for(platform)
            .into_iter()
            .filter(Account::is_eligible)
            .collect()
    }
}

/// In-memory account registry with hardcoded demo data.
pub struct MockAccountProvider {
    accounts: HashMap<String, Vec<Account>>,
}

impl MockAccountProvider {
    pub fn new(accounts: HashMap<String, Vec<Account>>) -> Self {
        Self { accounts }
    }

    pub fn with_demo_data() -> Self {
        let mut accounts = HashMap::new();

        accounts.insert(
            "betkings".to_string(),
            vec![
                demo_account("bk-001", "Marcus R.", "betkings", 2_400.0, Some(500.0), &["main"]),
                demo_account("bk-002", "Elena V.", "betkings", 860.0, None, &["vip"]),
                demo_account("bk-003", "Tomas W.", "betkings", 1_250.0, Some(300.0), &[]),
                Account {
                    phone_offline: true,
                    ..demo_account("bk-004", "Priya N.", "betkings", 3_100.0, None, &["vip"])
                },
            ],
        );

        accounts.insert(
            "oddspalace".to_string(),
            vec![
                demo_account("op-001", "Dana K.", "oddspalace", 540.0, Some(200.0), &["main"]),
                demo_account("op-002", "Felix B.", "oddspalace", 5_000.0, Some(1_000.0), &[]),
                Account {
                    on_hold: true,
                    ..demo_account("op-003", "Iris M.", "oddspalace", 900.0, None, &[])
                },
            ],
        );

        accounts.insert(
            "stakezone".to_string(),
            vec![
                demo_account("sz-001", "Oscar L.", "stakezone", 150.0, None, &["fresh"]),
                demo_account("sz-002", "Nora S.", "stakezone", 0.0, None, &[]),
            ],
        );

        Self { accounts }
    }
}

impl AccountProvider for MockAccountProvider {
    fn platforms(&self) -> Vec<String> {
        let mut platforms: Vec<String> = self.accounts.keys().cloned().collect();
        platforms.sort();
        platforms
    }

    fn accounts_for(&self, platform: &str) -> Vec<Account> {
        self.accounts.get(platform).cloned().unwrap_or_default()
    }
}

fn demo_account(
    id: &str,
    name: &str,
    platform: &str,
    balance: f64,
    limit: Option<f64>,
    tags: &[&str],
) -> Account {
    Account {
        id: id.to_string(),
        name: name.to_string(),
        platform: platform.to_string(),
        balance,
        limit,
        phone_offline: false,
        on_hold: false,
        tags: tags.iter().map(|t| t.to_string()).collect(),
    }
}
