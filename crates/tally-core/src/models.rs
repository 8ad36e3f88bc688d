//! Domain models for tally
//!
//! Raw records (accounts, transactions, liabilities, consent) are owned by the
//! store and treated as immutable snapshots for the duration of a computation.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::persona::PersonaKey;
use crate::signals::Signals;

/// Analysis window length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Window {
    Days30,
    Days180,
}

impl Window {
    pub fn days(&self) -> i64 {
        match self {
            Self::Days30 => 30,
            Self::Days180 => 180,
        }
    }

    /// Both windows, shortest first
    pub fn all() -> &'static [Window] {
        &[Self::Days30, Self::Days180]
    }

    /// Number of months covered, floored at 1 so monthly rates never divide by zero
    pub fn months(&self) -> f64 {
        (self.days() as f64 / 30.0).max(1.0)
    }

    /// Inclusive date range of the window ending at `as_of`, exactly `days` long
    pub fn current_range(&self, as_of: NaiveDate) -> (NaiveDate, NaiveDate) {
        (as_of - Duration::days(self.days() - 1), as_of)
    }

    /// Half-open range `[start, end)` of the equal-length window immediately before
    pub fn previous_range(&self, as_of: NaiveDate) -> (NaiveDate, NaiveDate) {
        let (since, _) = self.current_range(as_of);
        (since - Duration::days(self.days()), since)
    }
}

impl TryFrom<u32> for Window {
    type Error = String;

    fn try_from(days: u32) -> std::result::Result<Self, Self::Error> {
        match days {
            30 => Ok(Self::Days30),
            180 => Ok(Self::Days180),
            other => Err(format!("Unsupported window: {} days (use 30 or 180)", other)),
        }
    }
}

impl From<Window> for u32 {
    fn from(window: Window) -> Self {
        window.days() as u32
    }
}

impl std::str::FromStr for Window {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let days: u32 = s
            .trim()
            .trim_end_matches('d')
            .parse()
            .map_err(|_| format!("Invalid window: {}", s))?;
        Window::try_from(days)
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d", self.days())
    }
}

/// Account types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
    MoneyMarket,
    Hsa,
    Credit,
    #[serde(other)]
    Other,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Checking => "checking",
            Self::Savings => "savings",
            Self::MoneyMarket => "money_market",
            Self::Hsa => "hsa",
            Self::Credit => "credit",
            Self::Other => "other",
        }
    }

    /// Savings-like accounts count toward savings inflow and emergency cushion
    pub fn is_savings_like(&self) -> bool {
        matches!(self, Self::Savings | Self::MoneyMarket | Self::Hsa)
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "checking" => Ok(Self::Checking),
            "savings" => Ok(Self::Savings),
            "money_market" => Ok(Self::MoneyMarket),
            "hsa" => Ok(Self::Hsa),
            "credit" => Ok(Self::Credit),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown account type: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A financial account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    #[serde(default)]
    pub balance_current: f64,
    /// Only present for credit accounts
    #[serde(default)]
    pub credit_limit: Option<f64>,
    /// Masked account number, e.g. "••••4523"
    #[serde(default)]
    pub number_masked: Option<String>,
}

impl Account {
    /// Balance over limit, with the limit floored at 1 to avoid division by zero
    pub fn utilization(&self) -> f64 {
        self.balance_current / self.credit_limit.unwrap_or(0.0).max(1.0)
    }

    /// Last four characters of the masked number, for display
    pub fn last4(&self) -> Option<String> {
        let masked = self.number_masked.as_deref()?;
        let chars: Vec<char> = masked.chars().collect();
        if chars.is_empty() {
            return None;
        }
        let start = chars.len().saturating_sub(4);
        Some(chars[start..].iter().collect())
    }
}

/// Primary personal-finance category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Income,
    Transfer,
    Subscription,
    Groceries,
    Dining,
    Bills,
    Entertainment,
    Travel,
    #[default]
    #[serde(other)]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Transfer => "transfer",
            Self::Subscription => "subscription",
            Self::Groceries => "groceries",
            Self::Dining => "dining",
            Self::Bills => "bills",
            Self::Entertainment => "entertainment",
            Self::Travel => "travel",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "transfer" => Ok(Self::Transfer),
            "subscription" => Ok(Self::Subscription),
            "groceries" => Ok(Self::Groceries),
            "dining" => Ok(Self::Dining),
            "bills" => Ok(Self::Bills),
            "entertainment" => Ok(Self::Entertainment),
            "travel" => Ok(Self::Travel),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a transaction was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentChannel {
    Online,
    InStore,
    #[default]
    #[serde(other)]
    Other,
}

impl PaymentChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::InStore => "in_store",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for PaymentChannel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "in_store" | "in store" => Ok(Self::InStore),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown payment channel: {}", s)),
        }
    }
}

/// A financial transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub id: i64,
    pub user_id: String,
    pub account_id: String,
    pub date: NaiveDate,
    /// Negative = expense, positive = inflow
    pub amount: f64,
    #[serde(default)]
    pub merchant: String,
    #[serde(default)]
    pub merchant_entity_id: Option<String>,
    #[serde(default)]
    pub payment_channel: PaymentChannel,
    #[serde(default)]
    pub pfc_primary: Category,
    #[serde(default)]
    pub pending: bool,
}

impl Transaction {
    pub fn is_expense(&self) -> bool {
        self.amount < 0.0
    }

    fn entity_id(&self) -> Option<&str> {
        self.merchant_entity_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }

    /// Merchant name, falling back to the entity id, then "unknown"
    pub fn merchant_key(&self) -> &str {
        if !self.merchant.is_empty() {
            &self.merchant
        } else {
            self.entity_id().unwrap_or("unknown")
        }
    }

    /// Entity id, falling back to the merchant name, then "unknown"
    pub fn counterparty_key(&self) -> &str {
        match self.entity_id() {
            Some(id) => id,
            None if !self.merchant.is_empty() => &self.merchant,
            None => "unknown",
        }
    }
}

/// Liability types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiabilityType {
    CreditCard,
    StudentLoan,
    Mortgage,
    #[serde(other)]
    Other,
}

impl LiabilityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::StudentLoan => "student_loan",
            Self::Mortgage => "mortgage",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for LiabilityType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "credit_card" => Ok(Self::CreditCard),
            "student_loan" => Ok(Self::StudentLoan),
            "mortgage" => Ok(Self::Mortgage),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown liability type: {}", s)),
        }
    }
}

/// A liability (credit card statement state)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Liability {
    pub user_id: String,
    pub account_id: String,
    #[serde(rename = "type")]
    pub liability_type: LiabilityType,
    #[serde(default)]
    pub apr_percent: f64,
    #[serde(default)]
    pub min_payment: f64,
    #[serde(default)]
    pub last_payment: f64,
    #[serde(default)]
    pub last_stmt_bal: f64,
    #[serde(default)]
    pub is_overdue: bool,
}

/// Consent status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsentStatus {
    OptedIn,
    OptedOut,
}

impl ConsentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OptedIn => "OPTED_IN",
            Self::OptedOut => "OPTED_OUT",
        }
    }
}

impl std::str::FromStr for ConsentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "OPTED_IN" | "OPT_IN" => Ok(Self::OptedIn),
            "OPTED_OUT" | "OPT_OUT" => Ok(Self::OptedOut),
            _ => Err(format!("Unknown consent status: {}", s)),
        }
    }
}

impl std::fmt::Display for ConsentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's consent record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consent {
    pub user_id: String,
    pub status: ConsentStatus,
    pub updated_at: DateTime<Utc>,
}

/// One user's raw records, as loaded from a snapshot file or held in memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub user_id: String,
    #[serde(default)]
    pub consent: Option<ConsentStatus>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub liabilities: Vec<Liability>,
}

impl UserSnapshot {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }
}

/// A snapshot file containing any number of users
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub users: Vec<UserSnapshot>,
}

/// A persisted profile (append-only history)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: i64,
    pub user_id: String,
    pub window: Window,
    pub persona: PersonaKey,
    pub persona_reason: String,
    pub signals: Signals,
    /// Decision trace as JSON
    pub decision_trace: String,
    /// SHA-256 of the decision trace
    pub trace_digest: String,
    pub created_at: DateTime<Utc>,
}

/// Review queue item status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Overridden,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Overridden => "overridden",
        }
    }
}

impl std::str::FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "overridden" => Ok(Self::Overridden),
            _ => Err(format!("Unknown review status: {}", s)),
        }
    }
}

/// Operator decision on a review item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Override,
}

impl ReviewAction {
    pub fn resulting_status(&self) -> ReviewStatus {
        match self {
            Self::Approve => ReviewStatus::Approved,
            Self::Override => ReviewStatus::Overridden,
        }
    }
}

impl std::str::FromStr for ReviewAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "override" => Ok(Self::Override),
            _ => Err(format!("Unknown review action: {} (use approve or override)", s)),
        }
    }
}

/// An item in the human review queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: i64,
    pub user_id: String,
    pub profile_id: Option<i64>,
    pub reason: String,
    pub status: ReviewStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}
