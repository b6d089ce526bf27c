use rocket::form::FromFormField;
use uuid::Uuid;

use crate::theme::{House, Side, Theme};
use crate::wizard::{Edit, Step, Wizard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromFormField)]
pub enum Action {
    #[field(value = "next")]
    Next,
    #[field(value = "back")]
    Back,
    #[field(value = "submit")]
    Submit,
}

/// One roster row. Locked names are rendered disabled and not sent.
#[derive(Debug, FromForm)]
pub struct GuestFields {
    pub index: usize,
    pub name: Option<String>,
    /// Kept wide so out-of-range ages reach validation.
    pub age: Option<i32>,
    pub attending: bool,
}

#[derive(Debug, FromForm)]
pub struct StepForm {
    pub action: Action,
    pub guests: Vec<GuestFields>,
    pub theme: Option<Theme>,
    pub house: Option<House>,
    pub side: Option<Side>,
}

impl StepForm {
    /// Edits for the fields that differ from the wizard's current state.
    pub fn edits(&self, wizard: &Wizard) -> Vec<Edit> {
        let mut edits = Vec::new();
        match wizard.step() {
            Step::GuestInfo => {
                for row in &self.guests {
                    let guest = row.index;
                    let Some(current) = wizard.guests().get(guest) else {
                        // Let the wizard report the unknown slot.
                        edits.push(Edit::Age { guest, age: row.age });
                        continue;
                    };
                    if let Some(name) = &row.name {
                        if !current.name_locked() && *name != current.name {
                            edits.push(Edit::Name { guest, name: name.clone() });
                        }
                    }
                    if row.age != current.age {
                        edits.push(Edit::Age { guest, age: row.age });
                    }
                    if row.attending != current.attending {
                        edits.push(Edit::Attending { guest, attending: row.attending });
                    }
                }
            }
            Step::ThemePreferences => {
                let guest = wizard.cursor();
                if let Some(current) = wizard.guests().get(guest) {
                    if self.theme != current.theme {
                        edits.push(Edit::Theme { guest, theme: self.theme });
                    }
                    if self.house != current.house {
                        edits.push(Edit::House { guest, house: self.house });
                    }
                    if self.side != current.side {
                        edits.push(Edit::Side { guest, side: self.side });
                    }
                }
            }
            Step::Confirmation | Step::Submitted => {}
        }
        edits
    }
}

#[derive(Debug, FromForm)]
pub struct AttendanceForm {
    pub guest: Uuid,
    pub attending: bool,
}

#[derive(Debug, FromForm)]
pub struct NewInvitationForm {
    #[field(validate = len(2..=100))]
    pub name: String,
    #[field(validate = range(1..=30))]
    pub invitations_amount: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadline::Window;
    use crate::error::FormError;
    use crate::models::RootInvitation;
    use pretty_assertions::assert_eq;
    use rocket::form::Form;

    fn wizard(amount: i32) -> Wizard {
        let invitation = RootInvitation {
            id: Uuid::new_v4(),
            name: "Eduardo y Alejandra".to_string(),
            invitations_amount: amount,
            has_answered: false,
        };
        Wizard::new(&invitation, &[])
    }

    #[test]
    fn roster_rows_become_edits_for_changed_fields() {
        let wizard = wizard(2);
        let form: StepForm = Form::parse(
            "action=next\
             &guests[0].index=0&guests[0].age=34&guests[0].attending=true\
             &guests[1].index=1&guests[1].name=Juan&guests[1].age=&guests[1].attending=false",
        )
        .unwrap();

        assert_eq!(form.action, Action::Next);
        assert_eq!(
            form.edits(&wizard),
            vec![
                Edit::Age { guest: 0, age: Some(34) },
                Edit::Name { guest: 1, name: "Juan".to_string() },
                Edit::Attending { guest: 1, attending: false },
            ]
        );
    }

    #[test]
    fn theme_fields_target_the_current_guest() {
        let mut wizard = wizard(2);
        wizard.edit(Edit::Age { guest: 0, age: Some(30) }).unwrap();
        wizard.edit(Edit::Attending { guest: 1, attending: false }).unwrap();
        wizard.next(Window::Open).unwrap();

        let form: StepForm =
            Form::parse("action=next&theme=harry_potter&house=ravenclaw").unwrap();
        assert_eq!(
            form.edits(&wizard),
            vec![
                Edit::Theme { guest: 0, theme: Some(Theme::HarryPotter) },
                Edit::House { guest: 0, house: Some(House::Ravenclaw) },
            ]
        );
    }

    #[test]
    fn out_of_range_ages_are_reported_as_such() {
        let mut wizard = wizard(2);
        let form: StepForm = Form::parse(
            "action=next\
             &guests[0].index=0&guests[0].age=300&guests[0].attending=true\
             &guests[1].index=1&guests[1].name=Juan&guests[1].age=-1&guests[1].attending=true",
        )
        .unwrap();
        assert_eq!(form.guests[0].age, Some(300));
        assert_eq!(form.guests[1].age, Some(-1));

        for edit in form.edits(&wizard) {
            wizard.edit(edit).unwrap();
        }
        assert_eq!(wizard.next(Window::Open), Err(FormError::AgeOutOfRange { guest: 1 }));
    }

    #[test]
    fn forged_row_index_is_refused() {
        let mut wizard = wizard(1);
        let form: StepForm = Form::parse(
            "action=next&guests[0].index=18446744073709551615&guests[0].age=30",
        )
        .unwrap();
        let edits = form.edits(&wizard);
        assert_eq!(edits.len(), 1);
        let err = wizard.edit(edits[0].clone()).unwrap_err();
        assert_eq!(err, FormError::UnknownGuest { guest: usize::MAX });
        assert!(wizard.edits().is_empty());
    }

    #[test]
    fn unknown_values_are_left_empty() {
        let form: StepForm = Form::parse("action=back&theme=lord_of_the_rings").unwrap();
        assert_eq!(form.action, Action::Back);
        assert_eq!(form.theme, None);
    }

    #[test]
    fn new_invitation_needs_a_name_and_party_size() {
        assert!(Form::<NewInvitationForm>::parse("name=Familia%20Perez&invitations_amount=4").is_ok());
        assert!(Form::<NewInvitationForm>::parse("name=&invitations_amount=4").is_err());
        assert!(Form::<NewInvitationForm>::parse("name=Familia%20Perez&invitations_amount=0").is_err());
    }
}
