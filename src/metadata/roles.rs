//! Cast merging.
//!
//! Providers name people and characters inconsistently ("Jon Snow" vs.
//! "Jonathan Snow", "Walter White" vs. "Walter White / Heisenberg"). Merging an
//! incoming cast list into an item's roles prefers enriching an existing role
//! over adding a near-duplicate.

use marquee_common::{fill_missing, ProviderSlot, Role};
use serde::Serialize;

use super::provider::{Credit, SeriesActor};

/// One cast line from a provider, in provider-neutral form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingRole<'a> {
    /// Character played.
    pub character: &'a str,
    /// Actor name.
    pub actor: &'a str,
    /// Image URL.
    pub thumb: Option<&'a str>,
    /// The provider's id for the person.
    pub person_id: Option<&'a str>,
}

impl<'a> From<&'a Credit> for IncomingRole<'a> {
    fn from(credit: &'a Credit) -> Self {
        Self {
            character: &credit.character,
            actor: &credit.name,
            thumb: credit.profile_path.as_deref(),
            person_id: credit.person_id.as_deref(),
        }
    }
}

impl<'a> From<&'a SeriesActor> for IncomingRole<'a> {
    fn from(actor: &'a SeriesActor) -> Self {
        Self {
            character: &actor.role,
            actor: &actor.name,
            thumb: actor.image.as_deref(),
            person_id: actor.id.as_deref(),
        }
    }
}

/// What a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// Roles appended.
    pub added: usize,
    /// Existing roles that gained a thumbnail or a provider id.
    pub updated: usize,
}

impl MergeSummary {
    /// Whether the merge changed anything.
    pub fn is_empty(&self) -> bool {
        self.added == 0 && self.updated == 0
    }

    /// Add another summary's counts to this one.
    pub fn absorb(&mut self, other: MergeSummary) {
        self.added += other.added;
        self.updated += other.updated;
    }
}

/// Merge `incoming` into `roles`.
///
/// A matched role only has its empty `thumb` and empty `slot` id filled in.
/// An unmatched entry is appended with the next free id.
pub fn merge_roles<'a, I>(roles: &mut Vec<Role>, incoming: I, slot: ProviderSlot) -> MergeSummary
where
    I: IntoIterator<Item = IncomingRole<'a>>,
{
    let mut summary = MergeSummary::default();
    let mut next_id = roles.iter().map(|r| r.id).max().map_or(1, |max| max + 1);

    for entry in incoming {
        match find_match(roles, entry.character, entry.actor) {
            Some(index) => {
                let role = &mut roles[index];
                let thumb = fill_missing(&mut role.thumb, entry.thumb);
                let id = fill_missing(role.external_ids.slot_mut(slot), entry.person_id);
                if thumb || id {
                    summary.updated += 1;
                }
            }
            None => {
                let mut role = Role {
                    id: next_id,
                    character: entry.character.to_string(),
                    actor: entry.actor.to_string(),
                    thumb: entry.thumb.filter(|t| !t.is_empty()).map(str::to_string),
                    ..Default::default()
                };
                fill_missing(role.external_ids.slot_mut(slot), entry.person_id);
                roles.push(role);
                next_id += 1;
                summary.added += 1;
            }
        }
    }

    summary
}

/// Index of the role that `character` / `actor` refers to.
///
/// Strategies are tried in order, each across all roles:
///
/// 1. exact character and exact actor;
/// 2. case-insensitive character and fuzzy actor;
/// 3. case-insensitive actor and fuzzy character;
/// 4. exact actor, and one character name contains the other.
pub fn find_match(roles: &[Role], character: &str, actor: &str) -> Option<usize> {
    let exact = |r: &Role| r.character == character && r.actor == actor;
    let fuzzy_actor =
        |r: &Role| eq_ignore_case(&r.character, character) && compare_name_words(&r.actor, actor);
    let fuzzy_character =
        |r: &Role| eq_ignore_case(&r.actor, actor) && compare_name_words(&r.character, character);
    let containing = |r: &Role| {
        r.actor == actor && (r.character.contains(character) || character.contains(&r.character))
    };

    roles
        .iter()
        .position(exact)
        .or_else(|| roles.iter().position(fuzzy_actor))
        .or_else(|| roles.iter().position(fuzzy_character))
        .or_else(|| roles.iter().position(containing))
}

/// Fuzzy comparison of two names, word by word.
///
/// Both names must have the same number of whitespace-separated words. Words
/// at the same position either match case-insensitively (full) or one is a
/// case-insensitive prefix of the other (partial). The names match when every
/// word pair is full or partial and at most one pair is partial.
///
/// ```
/// use marquee::metadata::roles::compare_name_words;
///
/// assert!(compare_name_words("Jon Snow", "Jonathan Snow"));
/// assert!(!compare_name_words("John Smith", "Jane Doe"));
/// assert!(!compare_name_words("Bob", "Bob Jones"));
/// ```
pub fn compare_name_words(a: &str, b: &str) -> bool {
    let left: Vec<String> = a.split_whitespace().map(str::to_lowercase).collect();
    let right: Vec<String> = b.split_whitespace().map(str::to_lowercase).collect();

    if left.len() != right.len() {
        return false;
    }

    let mut full = 0;
    let mut partial = 0;
    for (x, y) in left.iter().zip(&right) {
        if x == y {
            full += 1;
        } else if x.starts_with(y.as_str()) || y.starts_with(x.as_str()) {
            partial += 1;
        } else {
            return false;
        }
    }

    full + 1 >= left.len() && partial <= 1
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}
