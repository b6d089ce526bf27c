#[macro_use] extern crate rocket;
use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::{Build, Rocket, State};
use rocket_db_pools::diesel::PgPool;
use rocket_db_pools::{Database, Connection, deadpool_redis};
use rocket_dyn_templates::{Template, context};
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use deadline::{Deadline, Window};
use error::{Error, FormError};
use forms::{Action, AttendanceForm, StepForm};
use invitation::{code_url, Invited};
use models::RootInvitation;
use wizard::{Step, Wizard};

pub mod admin;
pub mod config;
pub mod deadline;
pub mod error;
pub mod forms;
pub mod gateway;
pub mod invitation;
pub mod models;
pub mod schema;
pub mod session;
pub mod theme;
pub mod wizard;

#[derive(Database)]
#[database("rsvp")]
pub struct Db(PgPool);

#[derive(Database)]
#[database("redis")]
pub struct Redis(deadpool_redis::Pool);

/// What `GET /form` shows for an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormPage {
    /// Read-only answers with per-guest attendance toggles.
    Acknowledgment,
    Wizard,
}

impl FormPage {
    fn for_invitation(invitation: &RootInvitation) -> Self {
        if invitation.has_answered {
            FormPage::Acknowledgment
        } else {
            FormPage::Wizard
        }
    }
}

/// The stored wizard for this invitation, or a fresh one from its roster.
async fn current_wizard(
    db: &mut Connection<Db>,
    r: &mut Connection<Redis>,
    invitation: &RootInvitation,
    ttl_secs: i64,
) -> Result<Wizard, Error> {
    if let Some(wizard) = session::load(r, invitation.id).await? {
        if wizard.step() != Step::Submitted {
            return Ok(wizard);
        }
    }
    let roster = gateway::roster(db, invitation.id).await?;
    let wizard = Wizard::new(invitation, &roster);
    session::store(r, &wizard, ttl_secs).await?;
    Ok(wizard)
}

/// Applies the submitted fields, then the requested move.
async fn advance(
    wizard: &mut Wizard,
    step: &StepForm,
    db: &mut Connection<Db>,
    deadline: &Deadline,
) -> Result<Step, Error> {
    for edit in step.edits(wizard) {
        wizard.edit(edit)?;
    }

    match step.action {
        Action::Back => Ok(wizard.back()),
        Action::Next => {
            // Only leaving the guest step is gated by the deadline.
            let window = match wizard.step() {
                Step::GuestInfo => deadline.window().await,
                _ => Window::Open,
            };
            Ok(wizard.next(window)?)
        }
        Action::Submit => {
            let submission = wizard.submission(deadline.window().await)?;
            if gateway::has_answered(db, wizard.invitation_id()).await? {
                return Err(FormError::AlreadySubmitted.into());
            }
            gateway::save_submission(db, &submission).await?;
            wizard.mark_submitted();
            Ok(Step::Submitted)
        }
    }
}

#[get("/")]
fn index(invited: Invited) -> Template {
    Template::render("index", context! {
        form_url: code_url("/form", &invited.code),
    })
}

#[get("/form")]
async fn form_page(
    invited: Invited,
    mut db: Connection<Db>,
    mut r: Connection<Redis>,
    config: &State<AppConfig>,
    deadline: &State<Deadline>,
    flash: Option<FlashMessage<'_>>,
) -> Result<Template, Redirect> {
    let invitation = match invitation::load(&mut db, &invited).await {
        Ok(invitation) => invitation,
        Err(e) => {
            tracing::warn!(code = %invited.code, error = %e, "invitation rejected on page load");
            return Err(Redirect::to(uri!(invitation_error)));
        }
    };
    let flash = flash.map(|f| (f.kind().to_string(), f.message().to_string()));

    if FormPage::for_invitation(&invitation) == FormPage::Acknowledgment {
        let roster = match gateway::roster(&mut db, invitation.id).await {
            Ok(roster) => roster,
            Err(e) => {
                tracing::error!(invitation = %invitation.id, error = %e, "could not load guests");
                return Ok(Template::render("unavailable", context! {}));
            }
        };
        let guests: Vec<_> = roster
            .iter()
            .map(|(guest, doc)| context! {
                id: guest.id,
                name: &guest.name,
                attending: guest.attending.unwrap_or(false),
                theme: doc.as_ref().map(|d| d.theme.label()),
                house: doc.as_ref().and_then(|d| d.house).map(|h| h.label()),
                side: doc.as_ref().and_then(|d| d.jedi_sith).map(|s| s.label()),
            })
            .collect();
        return Ok(Template::render("answered", context! {
            name: &invitation.name,
            guests,
            attendance_url: code_url("/attendance", &invited.code),
            deadline: deadline.formatted(),
            flash,
        }));
    }

    match current_wizard(&mut db, &mut r, &invitation, config.session_ttl_secs).await {
        Ok(wizard) => Ok(Template::render("form", context! {
            name: &invitation.name,
            view: wizard.view(),
            action_url: code_url("/form", &invited.code),
            deadline: deadline.formatted(),
            flash,
        })),
        Err(e) => {
            tracing::error!(invitation = %invitation.id, error = %e, "could not start wizard");
            Ok(Template::render("unavailable", context! {}))
        }
    }
}

#[post("/form", data = "<step>")]
async fn form_step(
    invited: Invited,
    step: Form<StepForm>,
    mut db: Connection<Db>,
    mut r: Connection<Redis>,
    config: &State<AppConfig>,
    deadline: &State<Deadline>,
) -> Result<Redirect, Flash<Redirect>> {
    let here = || Redirect::to(code_url("/form", &invited.code));

    let invitation = match invitation::load(&mut db, &invited).await {
        Ok(invitation) => invitation,
        Err(e) => {
            tracing::warn!(code = %invited.code, error = %e, "invitation rejected on submit");
            return Ok(Redirect::to(uri!(invitation_error)));
        }
    };
    if FormPage::for_invitation(&invitation) == FormPage::Acknowledgment {
        return Err(Flash::error(here(), FormError::AlreadySubmitted.to_string()));
    }

    let mut wizard = match current_wizard(&mut db, &mut r, &invitation, config.session_ttl_secs).await {
        Ok(wizard) => wizard,
        Err(e) => {
            tracing::error!(invitation = %invitation.id, error = %e, "could not load wizard");
            return Err(Flash::error(here(), e.user_message()));
        }
    };

    let outcome = advance(&mut wizard, &step, &mut db, deadline).await;

    if let Ok(Step::Submitted) = outcome {
        if let Err(e) = session::clear(&mut r, invitation.id).await {
            tracing::warn!(invitation = %invitation.id, error = %e, "could not clear wizard session");
        }
        return Ok(Redirect::to(code_url("/success", &invited.code)));
    }

    // Edits are kept even when the move itself was refused.
    if let Err(e) = session::store(&mut r, &wizard, config.session_ttl_secs).await {
        tracing::error!(invitation = %invitation.id, error = %e, "could not store wizard");
        return Err(Flash::error(here(), e.user_message()));
    }

    match outcome {
        Ok(step) => {
            tracing::debug!(invitation = %invitation.id, ?step, "wizard moved");
            Ok(here())
        }
        Err(Error::Form(e)) => {
            tracing::debug!(invitation = %invitation.id, error = %e, "step refused");
            Err(Flash::error(here(), e.to_string()))
        }
        Err(e) => {
            tracing::error!(invitation = %invitation.id, error = %e, "submission failed");
            Err(Flash::error(here(), e.user_message()))
        }
    }
}

#[post("/attendance", data = "<change>")]
async fn attendance(
    invited: Invited,
    change: Form<AttendanceForm>,
    mut db: Connection<Db>,
    deadline: &State<Deadline>,
) -> Flash<Redirect> {
    let here = Redirect::to(code_url("/form", &invited.code));
    let window = if change.attending {
        deadline.window().await
    } else {
        Window::Open
    };

    match gateway::set_attendance(&mut db, invited.id, change.guest, change.attending, window).await {
        Ok(()) => Flash::success(here, "Attendance updated"),
        Err(e) => {
            tracing::warn!(invitation = %invited.id, guest = %change.guest, error = %e, "attendance change refused");
            Flash::error(here, e.user_message())
        }
    }
}

#[get("/success")]
fn success(invited: Invited) -> Template {
    Template::render("success", context! {
        form_url: code_url("/form", &invited.code),
    })
}

#[get("/invitation-error")]
fn invitation_error() -> Template {
    Template::render("invitation_error", context! {})
}

#[catch(401)]
fn unauthorized() -> Redirect {
    Redirect::to(uri!(invitation_error))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Pages that need nothing beyond the invitation guard.
fn app() -> Rocket<Build> {
    rocket::build()
        .mount("/", routes![index, success, invitation_error])
        .register("/", catchers![unauthorized])
        .attach(Template::fairing())
}

#[launch]
fn rocket() -> _ {
    init_tracing();
    app()
        .mount("/", routes![form_page, form_step, attendance])
        .mount("/", admin::routes())
        .attach(Db::init())
        .attach(Redis::init())
        .attach(config::stage())
}
