//! Reads and writes of invitations, guests and their theme preferences.

use std::collections::HashMap;

use diesel::dsl::{exists, select};
use diesel::upsert::excluded;
use rocket_db_pools::diesel::prelude::*;
use rocket_db_pools::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::deadline::Window;
use crate::error::{Error, FormError, Result, SaveStage};
use crate::invitation::encode_code;
use crate::models::{Guest, GuestRow, NewPreference, NewRootInvitation, Preference, RootInvitation};
use crate::schema::{guests, preferences, root_invitations};
use crate::theme::PreferenceDoc;
use crate::wizard::Submission;
use crate::Db;

pub async fn invitation_exists(db: &mut Connection<Db>, invitation: Uuid) -> Result<bool> {
    let found = select(exists(
        root_invitations::table.filter(root_invitations::id.eq(invitation)),
    ))
    .get_result(db)
    .await?;
    Ok(found)
}

pub async fn find_invitation(
    db: &mut Connection<Db>,
    invitation: Uuid,
) -> Result<Option<RootInvitation>> {
    let found = root_invitations::table
        .find(invitation)
        .select(RootInvitation::as_select())
        .first(db)
        .await
        .optional()?;
    Ok(found)
}

/// Whether the invitation was already answered.
pub async fn has_answered(db: &mut Connection<Db>, invitation: Uuid) -> Result<bool> {
    let answered: Option<bool> = root_invitations::table
        .find(invitation)
        .select(root_invitations::has_answered)
        .first(db)
        .await
        .optional()?;
    answered.ok_or(Error::InvitationNotFound(invitation))
}

/// Stored guests of an invitation, root guest first, with their preference
/// documents. Unreadable documents are logged and treated as missing.
pub async fn roster(
    db: &mut Connection<Db>,
    invitation: Uuid,
) -> Result<Vec<(Guest, Option<PreferenceDoc>)>> {
    let stored: Vec<Guest> = guests::table
        .filter(guests::root_invitation_id.eq(invitation))
        .order((guests::is_root.desc(), guests::created_at.asc(), guests::name.asc()))
        .select(Guest::as_select())
        .load(db)
        .await?;

    let ids: Vec<Uuid> = stored.iter().map(|g| g.id).collect();
    let prefs: Vec<Preference> = preferences::table
        .filter(preferences::guest_id.eq_any(ids))
        .select(Preference::as_select())
        .load(db)
        .await?;
    let mut docs: HashMap<Uuid, serde_json::Value> =
        prefs.into_iter().map(|p| (p.guest_id, p.preferences)).collect();

    let roster = stored
        .into_iter()
        .map(|guest| {
            let doc = docs.remove(&guest.id).and_then(|value| {
                match serde_json::from_value::<PreferenceDoc>(value) {
                    Ok(doc) => Some(doc),
                    Err(e) => {
                        tracing::warn!(guest = %guest.id, error = %e, "unreadable preference document");
                        None
                    }
                }
            });
            (guest, doc)
        })
        .collect();
    Ok(roster)
}

/// The value to write for an attendance toggle, or `None` when nothing
/// changes. Confirming a guest not already attending needs an open window;
/// declining is always allowed.
pub fn attendance_update(
    current: Option<bool>,
    requested: bool,
    window: Window,
) -> Result<Option<bool>, FormError> {
    if current == Some(requested) {
        return Ok(None);
    }
    if requested {
        window.ensure_open()?;
    }
    Ok(Some(requested))
}

pub async fn set_attendance(
    db: &mut Connection<Db>,
    invitation: Uuid,
    guest: Uuid,
    attending: bool,
    window: Window,
) -> Result<()> {
    let current: Option<Option<bool>> = guests::table
        .filter(guests::id.eq(guest))
        .filter(guests::root_invitation_id.eq(invitation))
        .select(guests::attending)
        .first(db)
        .await
        .optional()?;
    let current = current.ok_or(Error::GuestNotFound(guest))?;

    let Some(value) = attendance_update(current, attending, window)? else {
        return Ok(());
    };
    diesel::update(guests::table.find(guest))
        .set(guests::attending.eq(Some(value)))
        .execute(db)
        .await?;

    tracing::info!(%invitation, %guest, attending = value, "attendance updated");
    Ok(())
}

/// Rows written by one submission, in stage order. Every row is keyed by a
/// guest id fixed when the wizard was created, so planning the same
/// submission twice gives the same rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SavePlan {
    pub invitation: Uuid,
    /// Attending guests, inserted or updated on `id`.
    pub guests: Vec<GuestRow>,
    /// Stored guests of this invitation set to not attending.
    pub declined: Vec<Uuid>,
    /// One document per attending guest, inserted or updated on `guest_id`.
    pub preferences: Vec<NewPreference>,
}

impl SavePlan {
    pub fn new(submission: &Submission) -> Result<Self> {
        let invitation = submission.invitation_id;

        let guests = submission
            .attending
            .iter()
            .map(|g| GuestRow {
                id: g.id,
                root_invitation_id: invitation,
                name: g.name.clone(),
                age: Some(i32::from(g.age)),
                is_root: g.is_root,
                is_fixed: g.is_fixed,
                attending: Some(true),
            })
            .collect();

        let preferences = submission
            .attending
            .iter()
            .map(|g| -> Result<NewPreference> {
                Ok(NewPreference {
                    id: g.id,
                    guest_id: g.id,
                    preferences: serde_json::to_value(PreferenceDoc::new(g.choice, Some(g.age)))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SavePlan {
            invitation,
            guests,
            declined: submission.declined.clone(),
            preferences,
        })
    }
}

/// Writes a submission in three stages: guests, preferences, then the
/// invitation's answered flag. Stages are not wrapped in a transaction;
/// retrying the whole save after a failure converges on the same rows.
pub async fn save_submission(db: &mut Connection<Db>, submission: &Submission) -> Result<()> {
    let plan = SavePlan::new(submission)?;
    let invitation = plan.invitation;

    if !plan.guests.is_empty() {
        diesel::insert_into(guests::table)
            .values(&plan.guests)
            .on_conflict(guests::id)
            .do_update()
            .set((
                guests::name.eq(excluded(guests::name)),
                guests::age.eq(excluded(guests::age)),
                guests::attending.eq(excluded(guests::attending)),
            ))
            .execute(db)
            .await
            .map_err(|source| Error::Save { stage: SaveStage::Guests, source })?;
    }

    if !plan.declined.is_empty() {
        diesel::update(
            guests::table
                .filter(guests::root_invitation_id.eq(invitation))
                .filter(guests::id.eq_any(plan.declined.clone())),
        )
        .set(guests::attending.eq(Some(false)))
        .execute(db)
        .await
        .map_err(|source| Error::Save { stage: SaveStage::Guests, source })?;
    }

    if !plan.preferences.is_empty() {
        diesel::insert_into(preferences::table)
            .values(&plan.preferences)
            .on_conflict(preferences::guest_id)
            .do_update()
            .set(preferences::document.eq(excluded(preferences::document)))
            .execute(db)
            .await
            .map_err(|source| Error::Save { stage: SaveStage::Preferences, source })?;
    }

    diesel::update(root_invitations::table.find(invitation))
        .set(root_invitations::has_answered.eq(true))
        .execute(db)
        .await
        .map_err(|source| Error::Save { stage: SaveStage::Invitation, source })?;

    tracing::info!(
        %invitation,
        attending = plan.guests.len(),
        declined = plan.declined.len(),
        "submission saved"
    );
    Ok(())
}

/// One line of the operator overview.
#[derive(Debug, Serialize)]
pub struct InvitationSummary {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub invitations_amount: i32,
    pub has_answered: bool,
    pub attending: usize,
}

pub async fn list_invitations(db: &mut Connection<Db>) -> Result<Vec<InvitationSummary>> {
    let invitations: Vec<RootInvitation> = root_invitations::table
        .order(root_invitations::name.asc())
        .select(RootInvitation::as_select())
        .load(db)
        .await?;

    let attending: Vec<Uuid> = guests::table
        .filter(guests::attending.eq(true))
        .select(guests::root_invitation_id)
        .load(db)
        .await?;
    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for invitation in attending {
        *counts.entry(invitation).or_default() += 1;
    }

    Ok(invitations
        .into_iter()
        .map(|inv| InvitationSummary {
            code: encode_code(inv.id),
            attending: counts.get(&inv.id).copied().unwrap_or(0),
            id: inv.id,
            name: inv.name,
            invitations_amount: inv.invitations_amount,
            has_answered: inv.has_answered,
        })
        .collect())
}

/// Preference documents of guests currently attending.
pub async fn attending_preferences(db: &mut Connection<Db>) -> Result<Vec<PreferenceDoc>> {
    let values: Vec<serde_json::Value> = preferences::table
        .inner_join(guests::table)
        .filter(guests::attending.eq(true))
        .select(preferences::document)
        .load(db)
        .await?;
    Ok(values
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect())
}

pub async fn create_invitation(
    db: &mut Connection<Db>,
    name: &str,
    invitations_amount: i32,
) -> Result<RootInvitation> {
    let created = diesel::insert_into(root_invitations::table)
        .values(NewRootInvitation { id: Uuid::new_v4(), name, invitations_amount })
        .returning(RootInvitation::as_returning())
        .get_result(db)
        .await?;
    tracing::info!(id = %created.id, name, invitations_amount, "invitation created");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{House, Side, Theme, ThemeChoice};
    use crate::wizard::GuestEntry;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    fn closed() -> Window {
        Window::Closed {
            cutoff: DateTime::parse_from_rfc3339("2025-09-30T23:59:59-06:00").unwrap(),
        }
    }

    fn entry(name: &str, age: u8, choice: ThemeChoice) -> GuestEntry {
        GuestEntry {
            id: Uuid::new_v4(),
            name: name.to_string(),
            age,
            is_root: false,
            is_fixed: false,
            choice,
        }
    }

    fn submission() -> Submission {
        let mut root = entry(
            "Eduardo y Alejandra",
            33,
            ThemeChoice { theme: Theme::HarryPotter, house: Some(House::Ravenclaw), side: None },
        );
        root.is_root = true;
        let kid = entry(
            "Lupita",
            9,
            ThemeChoice { theme: Theme::StarWars, house: None, side: Some(Side::Jedi) },
        );
        Submission {
            invitation_id: Uuid::new_v4(),
            attending: vec![root, kid],
            declined: vec![Uuid::new_v4()],
        }
    }

    #[test]
    fn confirming_before_the_cutoff_writes_attending() {
        assert_eq!(attendance_update(Some(false), true, Window::Open), Ok(Some(true)));
        assert_eq!(attendance_update(None, true, Window::Open), Ok(Some(true)));
    }

    #[test]
    fn confirming_after_the_cutoff_is_refused() {
        assert!(matches!(
            attendance_update(Some(false), true, closed()),
            Err(FormError::DeadlinePassed { .. })
        ));
        assert!(matches!(
            attendance_update(None, true, closed()),
            Err(FormError::DeadlinePassed { .. })
        ));
    }

    #[test]
    fn declining_ignores_the_deadline_and_repeats_write_nothing() {
        assert_eq!(attendance_update(Some(true), false, closed()), Ok(Some(false)));
        assert_eq!(attendance_update(None, false, closed()), Ok(Some(false)));
        assert_eq!(attendance_update(Some(true), true, closed()), Ok(None));
        assert_eq!(attendance_update(Some(false), false, closed()), Ok(None));
    }

    #[test]
    fn plan_writes_attending_guests_and_their_documents() {
        let submission = submission();
        let plan = SavePlan::new(&submission).unwrap();

        assert_eq!(plan.invitation, submission.invitation_id);
        assert_eq!(plan.guests.len(), 2);
        assert!(plan.guests.iter().all(|row| {
            row.attending == Some(true) && row.root_invitation_id == submission.invitation_id
        }));
        assert_eq!(plan.guests[0].name, "Eduardo y Alejandra");
        assert_eq!(plan.guests[0].age, Some(33));
        assert!(plan.guests[0].is_root);

        let keys: Vec<Uuid> = plan.preferences.iter().map(|p| p.guest_id).collect();
        let ids: Vec<Uuid> = plan.guests.iter().map(|g| g.id).collect();
        assert_eq!(keys, ids);
        assert_eq!(
            plan.preferences[1].preferences,
            serde_json::json!({ "theme": "star_wars", "jediSith": "jedi", "age": 9 })
        );
    }

    #[test]
    fn plan_declines_stored_guests_not_attending() {
        let submission = submission();
        let plan = SavePlan::new(&submission).unwrap();
        assert_eq!(plan.declined, submission.declined);
        assert!(plan.guests.iter().all(|g| !plan.declined.contains(&g.id)));
    }

    #[test]
    fn planning_a_retry_gives_the_same_rows() {
        let submission = submission();
        let first = SavePlan::new(&submission).unwrap();
        let retry = SavePlan::new(&submission).unwrap();
        assert_eq!(first, retry);
    }

    #[test]
    fn nobody_attending_only_declines() {
        let declined = vec![Uuid::new_v4(), Uuid::new_v4()];
        let submission = Submission {
            invitation_id: Uuid::new_v4(),
            attending: Vec::new(),
            declined: declined.clone(),
        };
        let plan = SavePlan::new(&submission).unwrap();
        assert!(plan.guests.is_empty());
        assert!(plan.preferences.is_empty());
        assert_eq!(plan.declined, declined);
    }
}
