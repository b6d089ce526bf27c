//! The RSVP wizard: guest roster, one theme step per attending guest,
//! confirmation.
//!
//! All state lives in [`Wizard`], owned by the request handling the step.
//! Handlers turn submitted fields into [`Edit`] events and navigation
//! calls; pages only see the read-only [`WizardView`]. Every accepted edit
//! is logged, and the submission is rebuilt from the initial roster and
//! that log with [`replay`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deadline::Window;
use crate::error::FormError;
use crate::models::{Guest, RootInvitation};
use crate::theme::{House, PreferenceDoc, Side, Theme, ThemeChoice};

const MAX_AGE: i32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    GuestInfo,
    ThemePreferences,
    Confirmation,
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestDraft {
    pub id: Uuid,
    pub name: String,
    pub age: Option<i32>,
    pub attending: bool,
    pub is_root: bool,
    pub is_fixed: bool,
    /// Already has a row in `guests`.
    pub stored: bool,
    pub theme: Option<Theme>,
    pub house: Option<House>,
    pub side: Option<Side>,
}

impl GuestDraft {
    pub fn blank() -> Self {
        GuestDraft {
            id: Uuid::new_v4(),
            name: String::new(),
            age: None,
            attending: true,
            is_root: false,
            is_fixed: false,
            stored: false,
            theme: None,
            house: None,
            side: None,
        }
    }

    pub fn from_stored(guest: &Guest, doc: Option<&PreferenceDoc>) -> Self {
        GuestDraft {
            id: guest.id,
            name: guest.name.clone(),
            age: guest.age,
            attending: guest.attending.unwrap_or(true),
            is_root: guest.is_root,
            is_fixed: guest.is_fixed,
            stored: true,
            theme: doc.map(|d| d.theme),
            house: doc.and_then(|d| d.house),
            side: doc.and_then(|d| d.jedi_sith),
        }
    }

    pub fn name_locked(&self) -> bool {
        self.is_root || self.is_fixed
    }
}

/// One change to one guest, by zero-based slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edit {
    Name { guest: usize, name: String },
    Age { guest: usize, age: Option<i32> },
    Attending { guest: usize, attending: bool },
    Theme { guest: usize, theme: Option<Theme> },
    House { guest: usize, house: Option<House> },
    Side { guest: usize, side: Option<Side> },
}

impl Edit {
    pub fn guest(&self) -> usize {
        match *self {
            Edit::Name { guest, .. }
            | Edit::Age { guest, .. }
            | Edit::Attending { guest, .. }
            | Edit::Theme { guest, .. }
            | Edit::House { guest, .. }
            | Edit::Side { guest, .. } => guest,
        }
    }

    fn is_roster(&self) -> bool {
        matches!(self, Edit::Name { .. } | Edit::Age { .. } | Edit::Attending { .. })
    }
}

fn apply_edit(guests: &mut [GuestDraft], edit: &Edit) -> Result<(), FormError> {
    let index = edit.guest();
    let slot = guests
        .get_mut(index)
        .ok_or_else(|| FormError::UnknownGuest { guest: index.saturating_add(1) })?;

    match edit {
        Edit::Name { name, .. } => {
            if slot.name_locked() && slot.name != *name {
                return Err(FormError::NameLocked { guest: index + 1 });
            }
            slot.name = name.clone();
        }
        Edit::Age { age, .. } => slot.age = *age,
        Edit::Attending { attending, .. } => slot.attending = *attending,
        Edit::Theme { theme, .. } => slot.theme = *theme,
        Edit::House { house, .. } => slot.house = *house,
        Edit::Side { side, .. } => slot.side = *side,
    }
    Ok(())
}

/// Applies `edits` in order to a copy of `roster`.
pub fn replay(roster: &[GuestDraft], edits: &[Edit]) -> Result<Vec<GuestDraft>, FormError> {
    let mut guests = roster.to_vec();
    for edit in edits {
        apply_edit(&mut guests, edit)?;
    }
    Ok(guests)
}

fn validate_roster(guests: &[GuestDraft]) -> Result<(), FormError> {
    for (index, guest) in guests.iter().enumerate().filter(|(_, g)| g.attending) {
        let number = index + 1;
        let name = guest.name.trim();
        if name.is_empty() {
            return Err(FormError::MissingName { guest: number });
        }
        if !(2..=100).contains(&name.chars().count()) {
            return Err(FormError::NameLength { guest: number });
        }
        match guest.age {
            None => return Err(FormError::MissingAge { guest: number }),
            Some(age) if !(0..=MAX_AGE).contains(&age) => {
                return Err(FormError::AgeOutOfRange { guest: number })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn choice_for(index: usize, guest: &GuestDraft) -> Result<ThemeChoice, FormError> {
    ThemeChoice::resolve(index, guest.theme, guest.house, guest.side)
}

/// An attending guest as it will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestEntry {
    pub id: Uuid,
    pub name: String,
    pub age: u8,
    pub is_root: bool,
    pub is_fixed: bool,
    pub choice: ThemeChoice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub invitation_id: Uuid,
    /// Exactly the guests marked attending.
    pub attending: Vec<GuestEntry>,
    /// Stored guests now marked not attending.
    pub declined: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wizard {
    invitation_id: Uuid,
    root_name: String,
    roster: Vec<GuestDraft>,
    edits: Vec<Edit>,
    guests: Vec<GuestDraft>,
    step: Step,
    cursor: usize,
}

impl Wizard {
    /// Seeded guests come first; blank slots fill the party up to its
    /// invited size. Without seeded guests the first slot is the root guest.
    pub fn new(invitation: &RootInvitation, stored: &[(Guest, Option<PreferenceDoc>)]) -> Self {
        let mut roster: Vec<GuestDraft> = stored
            .iter()
            .map(|(guest, doc)| GuestDraft::from_stored(guest, doc.as_ref()))
            .collect();

        if roster.is_empty() {
            roster.push(GuestDraft {
                name: invitation.name.clone(),
                is_root: true,
                ..GuestDraft::blank()
            });
        }
        let invited = usize::try_from(invitation.invitations_amount).unwrap_or(0);
        while roster.len() < invited {
            roster.push(GuestDraft::blank());
        }

        Wizard::from_roster(invitation.id, invitation.name.clone(), roster)
    }

    pub fn from_roster(invitation_id: Uuid, root_name: String, roster: Vec<GuestDraft>) -> Self {
        Wizard {
            invitation_id,
            root_name,
            guests: roster.clone(),
            roster,
            edits: Vec::new(),
            step: Step::GuestInfo,
            cursor: 0,
        }
    }

    pub fn invitation_id(&self) -> Uuid {
        self.invitation_id
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn guests(&self) -> &[GuestDraft] {
        &self.guests
    }

    pub fn roster(&self) -> &[GuestDraft] {
        &self.roster
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Records one edit. Roster fields change only on the guest step, theme
    /// fields only for the guest under the cursor.
    pub fn edit(&mut self, edit: Edit) -> Result<(), FormError> {
        match self.step {
            Step::Submitted => return Err(FormError::AlreadySubmitted),
            Step::GuestInfo if edit.is_roster() => {}
            Step::ThemePreferences if !edit.is_roster() => {
                if edit.guest() != self.cursor {
                    return Err(FormError::NotCurrentGuest { guest: edit.guest().saturating_add(1) });
                }
            }
            _ => return Err(FormError::WrongStep),
        }
        apply_edit(&mut self.guests, &edit)?;
        self.edits.push(edit);
        Ok(())
    }

    fn first_attending_after(&self, index: Option<usize>) -> Option<usize> {
        let start = index.map_or(0, |i| i + 1);
        (start..self.guests.len()).find(|&i| self.guests[i].attending)
    }

    fn last_attending_before(&self, index: usize) -> Option<usize> {
        (0..index.min(self.guests.len()))
            .rev()
            .find(|&i| self.guests[i].attending)
    }

    /// Moves forward if the current step is complete. On failure nothing
    /// changes.
    pub fn next(&mut self, window: Window) -> Result<Step, FormError> {
        match self.step {
            Step::GuestInfo => {
                validate_roster(&self.guests)?;
                window.ensure_open()?;
                match self.first_attending_after(None) {
                    Some(first) => {
                        self.step = Step::ThemePreferences;
                        self.cursor = first;
                    }
                    None => {
                        self.step = Step::Confirmation;
                        self.cursor = 0;
                    }
                }
            }
            Step::ThemePreferences => {
                let guest = self
                    .guests
                    .get(self.cursor)
                    .ok_or(FormError::UnknownGuest { guest: self.cursor + 1 })?;
                choice_for(self.cursor, guest)?;
                match self.first_attending_after(Some(self.cursor)) {
                    Some(following) => self.cursor = following,
                    None => self.step = Step::Confirmation,
                }
            }
            Step::Confirmation => {}
            Step::Submitted => return Err(FormError::AlreadySubmitted),
        }
        Ok(self.step)
    }

    /// Moves back one guest or one step, skipping guests not attending.
    pub fn back(&mut self) -> Step {
        match self.step {
            Step::GuestInfo | Step::Submitted => {}
            Step::ThemePreferences => match self.last_attending_before(self.cursor) {
                Some(previous) => self.cursor = previous,
                None => {
                    self.step = Step::GuestInfo;
                    self.cursor = 0;
                }
            },
            Step::Confirmation => match self.last_attending_before(self.guests.len()) {
                Some(last) => {
                    self.step = Step::ThemePreferences;
                    self.cursor = last;
                }
                None => {
                    self.step = Step::GuestInfo;
                    self.cursor = 0;
                }
            },
        }
        self.step
    }

    /// Builds the payload to save, rebuilt from the edit log.
    pub fn submission(&self, window: Window) -> Result<Submission, FormError> {
        match self.step {
            Step::Confirmation => {}
            Step::Submitted => return Err(FormError::AlreadySubmitted),
            _ => return Err(FormError::NotConfirming),
        }

        let guests = replay(&self.roster, &self.edits)?;
        validate_roster(&guests)?;

        let mut attending = Vec::new();
        let mut declined = Vec::new();
        for (index, guest) in guests.iter().enumerate() {
            if guest.attending {
                attending.push(GuestEntry {
                    id: guest.id,
                    name: guest.name.trim().to_string(),
                    age: guest
                        .age
                        .and_then(|age| u8::try_from(age).ok())
                        .ok_or(FormError::MissingAge { guest: index + 1 })?,
                    is_root: guest.is_root,
                    is_fixed: guest.is_fixed,
                    choice: choice_for(index, guest)?,
                });
            } else if guest.stored {
                declined.push(guest.id);
            }
        }

        window.ensure_open()?;

        Ok(Submission { invitation_id: self.invitation_id, attending, declined })
    }

    pub fn mark_submitted(&mut self) {
        self.step = Step::Submitted;
    }

    pub fn view(&self) -> WizardView {
        let attending: Vec<usize> = (0..self.guests.len())
            .filter(|&i| self.guests[i].attending)
            .collect();
        let position = attending
            .iter()
            .position(|&i| i == self.cursor)
            .map_or(0, |p| p + 1);

        WizardView {
            step: self.step,
            root_name: self.root_name.clone(),
            guests: self
                .guests
                .iter()
                .enumerate()
                .map(|(index, guest)| GuestView::new(index, guest))
                .collect(),
            current: match self.step {
                Step::ThemePreferences => self.guests.get(self.cursor).map(|g| GuestView::new(self.cursor, g)),
                _ => None,
            },
            position,
            attending_total: attending.len(),
        }
    }
}

/// What a page needs to render one step.
#[derive(Debug, Serialize)]
pub struct WizardView {
    pub step: Step,
    pub root_name: String,
    pub guests: Vec<GuestView>,
    pub current: Option<GuestView>,
    /// One-based place of the current guest among attending guests.
    pub position: usize,
    pub attending_total: usize,
}

#[derive(Debug, Serialize)]
pub struct GuestView {
    pub index: usize,
    pub number: usize,
    pub name: String,
    pub age: Option<i32>,
    pub attending: bool,
    pub name_locked: bool,
    pub theme: Option<Theme>,
    pub theme_label: Option<&'static str>,
    pub house: Option<House>,
    pub house_label: Option<&'static str>,
    pub side: Option<Side>,
    pub side_label: Option<&'static str>,
    pub wants_house: bool,
    pub wants_side: bool,
}

impl GuestView {
    fn new(index: usize, guest: &GuestDraft) -> Self {
        GuestView {
            index,
            number: index + 1,
            name: guest.name.clone(),
            age: guest.age,
            attending: guest.attending,
            name_locked: guest.name_locked(),
            theme: guest.theme,
            theme_label: guest.theme.map(Theme::label),
            house: guest.house,
            house_label: guest.house.map(House::label),
            side: guest.side,
            side_label: guest.side.map(Side::label),
            wants_house: guest.theme.is_some_and(Theme::wants_house),
            wants_side: guest.theme.is_some_and(Theme::wants_side),
        }
    }
}
