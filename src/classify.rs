//! Account-type discrimination for a shared ledger. Accounts carry no type tag
//! this engine can rely on, so each account is matched against a ranked list of
//! size bands and must then survive a decode plus value sanity checks.

use crate::codec::market::{decode_market, MarketRecord, MARKET_MIN_LEN, MAX_OPTIONS};
use crate::codec::participation::{decode_participation, ParticipationRecord, PARTICIPATION_LEN};
use crate::types::{Address, RawAccount};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Market,
    Participation,
}

/// Inclusive byte-length band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBand {
    pub min: usize,
    pub max: usize,
}

impl SizeBand {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, len: usize) -> bool {
        (self.min..=self.max).contains(&len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierRule {
    pub band: SizeBand,
    pub kind: AccountKind,
}

/// Empirical thresholds. They come from observed deployments, not from the
/// record layout, and need revalidating per environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    pub participation: SizeBand,
    pub market: SizeBand,
    /// Largest raw amount a single participation may plausibly carry.
    pub max_participation_amount: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            participation: SizeBand::new(80, 128),
            market: SizeBand::new(MARKET_MIN_LEN, 2048),
            max_participation_amount: 1_000_000 * 10u64.pow(6),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Market(MarketRecord),
    Participation(ParticipationRecord),
}

#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassifierRule>,
    max_participation_amount: u64,
}

impl Classifier {
    pub fn new(rules: Vec<ClassifierRule>, max_participation_amount: u64) -> Self {
        Self { rules, max_participation_amount }
    }

    /// Participation first: its band is the narrower one.
    pub fn from_config(cfg: &ClassifierConfig) -> Self {
        Self::new(
            vec![
                ClassifierRule { band: cfg.participation, kind: AccountKind::Participation },
                ClassifierRule { band: cfg.market, kind: AccountKind::Market },
            ],
            cfg.max_participation_amount,
        )
    }

    /// First rule whose band matches and whose sanity checks pass wins. A
    /// reject is not an error; the account is simply not ours.
    pub fn classify(&self, raw: &RawAccount) -> Option<Classified> {
        let len = raw.bytes.len();
        for rule in self.rules.iter().filter(|r| r.band.contains(len)) {
            if let Some(c) = self.check(rule.kind, raw) {
                return Some(c);
            }
        }
        tracing::debug!(address = %raw.address, len, "account skipped by classifier");
        None
    }

    pub fn as_market(&self, raw: &RawAccount) -> Option<MarketRecord> {
        match self.classify(raw)? {
            Classified::Market(m) => Some(m),
            Classified::Participation(_) => None,
        }
    }

    pub fn as_participation(&self, raw: &RawAccount) -> Option<ParticipationRecord> {
        match self.classify(raw)? {
            Classified::Participation(p) => Some(p),
            Classified::Market(_) => None,
        }
    }

    pub fn looks_like_market(&self, raw: &RawAccount) -> bool {
        self.as_market(raw).is_some()
    }

    pub fn looks_like_participation(&self, raw: &RawAccount) -> bool {
        self.as_participation(raw).is_some()
    }

    fn check(&self, kind: AccountKind, raw: &RawAccount) -> Option<Classified> {
        match kind {
            AccountKind::Market => {
                let m = decode_market(&raw.bytes).ok()?;
                (!m.question.is_empty()).then_some(Classified::Market(m))
            }
            AccountKind::Participation => {
                if raw.bytes.len() < PARTICIPATION_LEN {
                    return None;
                }
                let p = decode_participation(&raw.bytes).ok()?;
                let sane = p.amount > 0
                    && p.amount <= self.max_participation_amount
                    && (p.option_index as usize) < MAX_OPTIONS
                    && p.owner != Address::default();
                sane.then_some(Classified::Participation(p))
            }
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::from_config(&ClassifierConfig::default())
    }
}
