use super::schema::{guests, preferences, root_invitations};
use diesel::prelude::*;
use uuid::Uuid;

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = root_invitations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RootInvitation {
    pub id: Uuid,
    pub name: String,
    pub invitations_amount: i32,
    pub has_answered: bool,
}

#[derive(Insertable)]
#[diesel(table_name = root_invitations)]
pub struct NewRootInvitation<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub invitations_amount: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = guests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Guest {
    pub id: Uuid,
    pub root_invitation_id: Uuid,
    pub name: String,
    pub age: Option<i32>,
    pub is_root: bool,
    pub is_fixed: bool,
    pub attending: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = guests)]
pub struct GuestRow {
    pub id: Uuid,
    pub root_invitation_id: Uuid,
    pub name: String,
    pub age: Option<i32>,
    pub is_root: bool,
    pub is_fixed: bool,
    pub attending: Option<bool>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = preferences)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Preference {
    pub guest_id: Uuid,
    #[diesel(column_name = document)]
    pub preferences: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = preferences)]
pub struct NewPreference {
    pub id: Uuid,
    pub guest_id: Uuid,
    #[diesel(column_name = document)]
    pub preferences: serde_json::Value,
}
