//! Incident list and form controllers.

mod common;

use std::time::Duration;

use br_models::{Incident, IncidentState};
use br_services::IncidentInput;
use br_state::{IncidentField, IncidentFormController, IncidentFormEvent, IncidentListController};

fn new_incident(ctx: &br_services::AppContext, title: &str) -> i64 {
    let input = IncidentInput {
        title: title.into(),
        detail: "Detalle suficientemente largo".into(),
        ..IncidentInput::default()
    };
    ctx.incidents.insert_incident(&input, None).unwrap().id.unwrap()
}

#[tokio::test]
async fn list_loads_and_follows_store() {
    let (ctx, _dir) = common::logged_in("b@b.cl", "Bombero123!");
    let list = IncidentListController::all(ctx.incidents.clone(), ctx.session.clone());

    let state = common::settle(list.state(), |s| !s.loading).await;
    assert_eq!(state.incidents.len(), 1);

    let repo = ctx.incidents.clone();
    tokio::task::spawn_blocking(move || {
        repo.insert_incident(
            &IncidentInput {
                title: "Nuevo incidente".into(),
                detail: "Ocurrio recien en la esquina".into(),
                ..IncidentInput::default()
            },
            None,
        )
    })
    .await
    .unwrap()
    .unwrap();

    let state = common::settle(list.state(), |s| s.incidents.len() == 2).await;
    assert_eq!(state.incidents[0].incident.title, "Nuevo incidente");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn take_is_shown_before_it_is_confirmed() {
    let (ctx, _dir) = common::logged_in("b@b.cl", "Bombero123!");
    let id = new_incident(&ctx, "Fuego en basural");
    let list = IncidentListController::all(ctx.incidents.clone(), ctx.session.clone());
    common::settle(list.state(), |s| s.get(id).is_some()).await;

    list.take(id);
    let optimistic = list.state().snapshot();
    let row = optimistic.get(id).unwrap();
    assert_eq!(row.incident.state, IncidentState::Assigned);
    assert_eq!(row.incident.assigned_to, Some(common::FIREFIGHTER_ID));
    assert!(optimistic.pending_takes.contains_key(&id));

    let state = common::settle(list.state(), |s| s.pending_takes.is_empty()).await;
    assert_eq!(state.message.as_deref(), Some("incident taken"));
    let stored = ctx.incidents.find(id).unwrap().incident;
    assert_eq!(stored.assigned_to, Some(common::FIREFIGHTER_ID));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lost_take_is_rolled_back() {
    let (ctx, _dir) = common::logged_in("b@b.cl", "Bombero123!");
    let id = new_incident(&ctx, "Cable cortado");
    let list = IncidentListController::all(ctx.incidents.clone(), ctx.session.clone());
    common::settle(list.state(), |s| s.get(id).is_some()).await;

    // Someone else wins without the list hearing about it yet.
    let conn = ctx.database.conn().unwrap();
    assert_eq!(Incident::try_assign(&conn, id, common::SUPPORT_ID).unwrap(), 1);
    drop(conn);
    list.take(id);

    let state = common::settle(list.state(), |s| {
        s.pending_takes.is_empty() && s.message.is_some()
    })
    .await;
    assert_eq!(state.message.as_deref(), Some("this incident was already taken"));
    assert_eq!(state.get(id).unwrap().incident.assigned_to, Some(common::SUPPORT_ID));
}

#[tokio::test]
async fn close_waits_for_the_store() {
    let (ctx, _dir) = common::logged_in("b@b.cl", "Bombero123!");
    let id = new_incident(&ctx, "Arbol sobre auto");
    ctx.incidents.take_incident(id, common::FIREFIGHTER_ID).unwrap();
    let list = IncidentListController::mine(ctx.incidents.clone(), ctx.session.clone()).unwrap();
    common::settle(list.state(), |s| s.get(id).is_some()).await;

    list.close(id);
    let pending = list.state().snapshot();
    assert!(pending.closing.contains(&id));
    assert_eq!(pending.get(id).unwrap().incident.state, IncidentState::Assigned);

    let state = common::settle(list.state(), |s| s.closing.is_empty()).await;
    assert_eq!(state.message.as_deref(), Some("incident closed"));
    assert_eq!(ctx.incidents.find(id).unwrap().incident.state, IncidentState::Closed);
}

#[tokio::test]
async fn closing_a_created_incident_reports_an_error() {
    let (ctx, _dir) = common::logged_in("b@b.cl", "Bombero123!");
    let id = new_incident(&ctx, "Perro atrapado");
    let list = IncidentListController::all(ctx.incidents.clone(), ctx.session.clone());
    common::settle(list.state(), |s| s.get(id).is_some()).await;

    list.close(id);
    let state = common::settle(list.state(), |s| s.error.is_some()).await;
    assert!(state.error.unwrap().contains("CLOSED"));
}

#[tokio::test]
async fn only_admins_assign() {
    let (ctx, _dir) = common::logged_in("c@c.cl", "Ciudadano123!");
    let id = new_incident(&ctx, "Semaforo apagado");
    let list = IncidentListController::all(ctx.incidents.clone(), ctx.session.clone());
    common::settle(list.state(), |s| s.get(id).is_some()).await;

    list.assign(id, common::FIREFIGHTER_ID);
    assert!(list.state().snapshot().error.is_some());
    assert_eq!(ctx.incidents.find(id).unwrap().incident.state, IncidentState::Created);
}

#[tokio::test]
async fn form_flags_title_boundaries() {
    let (ctx, _dir) = common::logged_in("c@c.cl", "Ciudadano123!");
    let form = IncidentFormController::create(ctx.incidents.clone(), ctx.session.clone());

    form.set_field(IncidentField::Detail, "Detalle suficientemente largo");
    for (title, ok) in [("a".repeat(9), false), ("a".repeat(10), true), ("a".repeat(30), true), ("a".repeat(31), false)] {
        form.set_field(IncidentField::Title, &title);
        let state = form.state().snapshot();
        assert_eq!(state.can_submit, ok, "title of {} chars", title.len());
        assert_eq!(state.errors.contains_key("title"), !ok);
    }

    form.set_field(IncidentField::Latitude, "-33.4567890123456");
    assert!(form.state().snapshot().errors.contains_key("latitude"));
}

#[tokio::test]
async fn form_creates_incident_for_reporter() {
    let (ctx, dir) = common::logged_in("c@c.cl", "Ciudadano123!");
    let form = IncidentFormController::create(ctx.incidents.clone(), ctx.session.clone());
    let mut events = form.events().listen();

    form.set_field(IncidentField::Title, "Microbasural");
    form.set_field(IncidentField::Detail, "Acumulacion de basura en la plaza");
    form.set_field(IncidentField::Comuna, "Nunoa");
    let (picker, _) = common::picker_with_image(&dir, "basura.jpg", b"photo");
    form.pick_photo(picker);
    common::settle(form.state(), |s| s.form.photo.is_some()).await;
    form.submit();

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    let IncidentFormEvent::Saved { incident_id } = event;
    let stored = ctx.incidents.find(incident_id).unwrap();
    assert_eq!(stored.reporter_name.as_deref(), Some("Ciudadano Demo"));
    assert!(stored.photo_url.unwrap().starts_with("file://"));
}

#[tokio::test]
async fn closed_incident_opens_read_only() {
    let (ctx, _dir) = common::logged_in("b@b.cl", "Bombero123!");
    let id = new_incident(&ctx, "Incendio extinguido");
    ctx.incidents.take_incident(id, common::FIREFIGHTER_ID).unwrap();
    ctx.incidents.close_incident(id).unwrap();

    let form = IncidentFormController::edit(ctx.incidents.clone(), ctx.session.clone(), id);
    let state = common::settle(form.state(), |s| !s.loading).await;

    assert!(state.read_only);
    assert!(!state.can_submit);
    assert_eq!(state.form.title, "Incendio extinguido");
}

#[tokio::test]
async fn edit_saves_changes() {
    let (ctx, _dir) = common::logged_in("b@b.cl", "Bombero123!");
    let id = new_incident(&ctx, "Choque leve");
    let form = IncidentFormController::edit(ctx.incidents.clone(), ctx.session.clone(), id);
    common::settle(form.state(), |s| !s.loading).await;

    form.set_field(IncidentField::Title, "Choque leve sin heridos");
    form.submit();
    common::settle(form.state(), |s| s.message.is_some()).await;

    assert_eq!(ctx.incidents.find(id).unwrap().incident.title, "Choque leve sin heridos");
}

#[tokio::test]
async fn since_date_filters_the_list() {
    let (ctx, _dir) = common::logged_in("b@b.cl", "Bombero123!");
    let list = IncidentListController::all(ctx.incidents.clone(), ctx.session.clone());
    common::settle(list.state(), |s| !s.loading && s.incidents.len() == 1).await;

    list.set_since("mañana");
    let state = list.state().snapshot();
    assert_eq!(state.since_error.as_deref(), Some("date must use the YYYY-MM-DD format"));
    assert_eq!(state.visible().len(), 1);

    list.set_since("2999-01-01");
    let state = list.state().snapshot();
    assert!(state.since_error.is_none());
    assert!(state.visible().is_empty());

    list.set_since("");
    assert_eq!(list.state().snapshot().visible().len(), 1);
}
