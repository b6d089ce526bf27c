//! Operator pages: answers so far and new root invitations.

use rocket::form::Form;
use rocket::http::Status;
use rocket::request::{FlashMessage, FromRequest, Outcome, Request};
use rocket::response::{Flash, Redirect};
use rocket::{Route, State};
use rocket_db_pools::Connection;
use rocket_dyn_templates::{context, Template};

use crate::config::AppConfig;
use crate::forms::NewInvitationForm;
use crate::gateway;
use crate::invitation::{code_url, encode_code};
use crate::theme::ThemeTally;
use crate::Db;

/// Present only when an admin token is configured and the request carries it.
pub struct Admin {
    token: String,
}

impl Admin {
    fn url(&self, path: &str) -> String {
        format!("{path}?token={}", rocket::http::RawStr::new(&self.token).percent_encode())
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Admin {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let expected = req
            .rocket()
            .state::<AppConfig>()
            .and_then(|config| config.admin_token.as_deref());
        let given = req.query_value::<&str>("token").and_then(|t| t.ok());

        match (expected, given) {
            (Some(expected), Some(given)) if !expected.is_empty() && expected == given => {
                Outcome::Success(Admin { token: given.to_string() })
            }
            _ => Outcome::Error((Status::NotFound, ())),
        }
    }
}

fn public_link(config: &AppConfig, code: &str) -> String {
    format!("{}{}", config.public_url.trim_end_matches('/'), code_url("/", code))
}

#[get("/admin")]
async fn overview(
    admin: Admin,
    mut db: Connection<Db>,
    config: &State<AppConfig>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let invitations = gateway::list_invitations(&mut db).await;
    let prefs = gateway::attending_preferences(&mut db).await;

    let (invitations, tally) = match (invitations, prefs) {
        (Ok(invitations), Ok(prefs)) => (invitations, ThemeTally::from_docs(&prefs)),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "could not load overview");
            return Template::render("unavailable", context! {});
        }
    };

    let rows: Vec<_> = invitations
        .iter()
        .map(|inv| context! { invitation: inv, link: public_link(config, &inv.code) })
        .collect();
    let answered = invitations.iter().filter(|inv| inv.has_answered).count();
    let attending: usize = invitations.iter().map(|inv| inv.attending).sum();

    Template::render("admin", context! {
        rows,
        answered,
        pending: invitations.len() - answered,
        attending,
        tally,
        add_url: admin.url("/admin/add"),
        flash: flash.map(|f| f.message().to_string()),
    })
}

#[post("/admin/add", data = "<new>")]
async fn add_invitation(
    admin: Admin,
    new: Form<NewInvitationForm>,
    mut db: Connection<Db>,
    config: &State<AppConfig>,
) -> Result<Template, Flash<Redirect>> {
    let name = new.name.trim();
    match gateway::create_invitation(&mut db, name, new.invitations_amount).await {
        Ok(created) => {
            let code = encode_code(created.id);
            Ok(Template::render("admin_added", context! {
                name: &created.name,
                invitations_amount: created.invitations_amount,
                link: public_link(config, &code),
                code,
                back_url: admin.url("/admin"),
            }))
        }
        Err(e) => {
            tracing::error!(error = %e, name, "could not create invitation");
            Err(Flash::error(Redirect::to(admin.url("/admin")), e.user_message()))
        }
    }
}

pub fn routes() -> Vec<Route> {
    routes![overview, add_invitation]
}
