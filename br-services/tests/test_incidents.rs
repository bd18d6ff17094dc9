//! Integration tests for the incident lifecycle.

mod common;

use std::sync::{Arc, Barrier};

use br_core::error::{BrError, ErrorKind};
use br_models::queries::IncidentFilter;
use br_models::IncidentState;
use br_services::{AppEvent, IncidentInput, TakeOutcome};

fn input(title: &str) -> IncidentInput {
    IncidentInput {
        title: title.into(),
        detail: "Humo visible desde la calle".into(),
        latitude: "-33.45".into(),
        longitude: "-70.66".into(),
        comuna: "Santiago".into(),
        region: "Metropolitana".into(),
        address: "Alameda 100".into(),
        photo: None,
    }
}

#[test]
fn title_length_boundaries() {
    let (ctx, _dir) = common::seeded_context();

    for ok in ["a".repeat(10), "b".repeat(30)] {
        assert!(ctx.incidents.insert_incident(&input(&ok), None).is_ok(), "{ok} should pass");
    }
    for bad in ["c".repeat(9), "d".repeat(31)] {
        let err = ctx.incidents.insert_incident(&input(&bad), None).unwrap_err();
        assert!(matches!(err, BrError::Validation { field: "title", .. }));
    }
}

#[test]
fn new_incident_starts_created_and_unassigned() {
    let (ctx, _dir) = common::seeded_context();
    let mut events = ctx.event_bus.subscribe();

    let incident = ctx
        .incidents
        .insert_incident(&input("Arbol caido en ruta"), Some(common::CITIZEN_ID))
        .unwrap();

    assert_eq!(incident.state, IncidentState::Created);
    assert_eq!(incident.assigned_to, None);
    assert_eq!(incident.latitude, Some(-33.45));
    assert!(matches!(events.try_recv().unwrap(), AppEvent::IncidentCreated { .. }));

    let listed = ctx.incidents.find(incident.id.unwrap()).unwrap();
    assert_eq!(listed.reporter_name.as_deref(), Some("Ciudadano Demo"));
}

#[test]
fn concurrent_take_has_exactly_one_winner() {
    let (ctx, _dir) = common::seeded_context();
    let id = ctx
        .incidents
        .insert_incident(&input("Incendio forestal"), None)
        .unwrap()
        .id
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [common::FIREFIGHTER_ID, common::SUPPORT_ID]
        .into_iter()
        .map(|user_id| {
            let repo = ctx.incidents.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                repo.take_incident(id, user_id).unwrap()
            })
        })
        .collect();
    let outcomes: Vec<TakeOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<i64> = outcomes
        .iter()
        .filter_map(|o| match o {
            TakeOutcome::Taken(incident) => incident.assigned_to,
            TakeOutcome::AlreadyTaken { .. } => None,
        })
        .collect();
    assert_eq!(winners.len(), 1);

    let loser = outcomes
        .iter()
        .find_map(|o| match o {
            TakeOutcome::AlreadyTaken { assigned_to } => Some(*assigned_to),
            TakeOutcome::Taken(_) => None,
        })
        .unwrap();
    assert_eq!(loser, winners[0]);

    let stored = ctx.incidents.find(id).unwrap().incident;
    assert_eq!(stored.state, IncidentState::Assigned);
    assert_eq!(stored.assigned_to, Some(winners[0]));
}

#[test]
fn take_by_unknown_user_is_not_found() {
    let (ctx, _dir) = common::seeded_context();
    let id = ctx.incidents.insert_incident(&input("Poste electrico"), None).unwrap().id.unwrap();

    let err = ctx.incidents.take_incident(id, 999).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(ctx.incidents.find(id).unwrap().incident.state, IncidentState::Created);
}

#[test]
fn lost_assignment_converts_to_conflict() {
    let (ctx, _dir) = common::seeded_context();
    let id = ctx.incidents.insert_incident(&input("Arbol caido"), None).unwrap().id.unwrap();

    let first = ctx.incidents.assign_incident(id, common::FIREFIGHTER_ID).unwrap();
    assert_eq!(first.into_result(id).unwrap().assigned_to, Some(common::FIREFIGHTER_ID));

    let err = ctx
        .incidents
        .assign_incident(id, common::SUPPORT_ID)
        .unwrap()
        .into_result(id)
        .unwrap_err();
    assert!(matches!(
        err,
        BrError::AlreadyTaken { incident_id, assigned_to } if incident_id == id && assigned_to == common::FIREFIGHTER_ID
    ));
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn close_requires_assignment() {
    let (ctx, _dir) = common::seeded_context();
    let id = ctx.incidents.insert_incident(&input("Fuga de gas"), None).unwrap().id.unwrap();

    let err = ctx.incidents.close_incident(id).unwrap_err();
    assert!(matches!(err, BrError::InvalidTransition { .. }));

    ctx.incidents.take_incident(id, common::FIREFIGHTER_ID).unwrap();
    let closed = ctx.incidents.close_incident(id).unwrap();
    assert_eq!(closed.state, IncidentState::Closed);
    assert_eq!(closed.assigned_to, Some(common::FIREFIGHTER_ID));

    assert!(matches!(
        ctx.incidents.close_incident(id).unwrap_err(),
        BrError::InvalidTransition { .. }
    ));
    assert!(matches!(
        ctx.incidents.take_incident(id, common::SUPPORT_ID).unwrap_err(),
        BrError::InvalidTransition { .. }
    ));
}

#[test]
fn closed_incident_is_read_only() {
    let (ctx, _dir) = common::seeded_context();
    let id = ctx.incidents.insert_incident(&input("Choque multiple"), None).unwrap().id.unwrap();
    ctx.incidents.take_incident(id, common::FIREFIGHTER_ID).unwrap();
    ctx.incidents.close_incident(id).unwrap();

    let err = ctx.incidents.update_incident(id, &input("Choque corregido")).unwrap_err();
    assert!(matches!(err, BrError::IncidentClosed(i) if i == id));
    assert_eq!(ctx.incidents.find(id).unwrap().incident.title, "Choque multiple");
}

#[test]
fn update_keeps_photo_when_none_given() {
    let (ctx, _dir) = common::seeded_context();
    let mut form = input("Inundacion en paso");
    form.photo = Some("https://img.example/flood.jpg".into());
    let created = ctx.incidents.insert_incident(&form, None).unwrap();

    let mut edit = IncidentInput::from(&created);
    edit.title = "Inundacion en paso bajo".into();
    let updated = ctx.incidents.update_incident(created.id.unwrap(), &edit).unwrap();

    assert_eq!(updated.foto_id, created.foto_id);
    assert_eq!(updated.title, "Inundacion en paso bajo");
}

#[test]
fn list_filters_by_state_and_assignee() {
    let (ctx, _dir) = common::seeded_context();
    let id = ctx.incidents.insert_incident(&input("Derrame quimico"), None).unwrap().id.unwrap();
    ctx.incidents.take_incident(id, common::FIREFIGHTER_ID).unwrap();

    let created = ctx.incidents.list(&IncidentFilter::by_state(IncidentState::Created)).unwrap();
    assert_eq!(created.len(), 1);
    let mine = ctx.incidents.list(&IncidentFilter::assigned_to(common::FIREFIGHTER_ID)).unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].assignee_name.as_deref(), Some("Bombero Demo"));
}

#[tokio::test]
async fn live_listing_follows_transitions() {
    let (ctx, _dir) = common::seeded_context();
    let mut created = ctx.incidents.observe_by_state(IncidentState::Created);
    let first = created.wait_until(|rows| rows.len() == 1).await.unwrap();
    let id = first[0].incident.id.unwrap();

    let repo = ctx.incidents.clone();
    tokio::task::spawn_blocking(move || repo.take_incident(id, common::FIREFIGHTER_ID))
        .await
        .unwrap()
        .unwrap();

    let after = created.wait_until(|rows| rows.is_empty()).await;
    assert_eq!(after, Some(Vec::new()));
}

#[tokio::test]
async fn single_and_assignee_views_follow_a_take() {
    let (ctx, _dir) = common::seeded_context();
    let id = ctx
        .incidents
        .insert_incident(&input("Derrame de aceite"), Some(common::CITIZEN_ID))
        .unwrap()
        .id
        .unwrap();

    let mut single = ctx.incidents.observe_incident(id);
    let mut assigned = ctx.incidents.observe_assigned_to(common::FIREFIGHTER_ID);
    let mut all = ctx.incidents.observe_all();
    assert!(assigned.wait_until(|rows| rows.is_empty()).await.is_some());
    let total = all.wait_until(|rows| rows.len() == 2).await.unwrap().len();

    let repo = ctx.incidents.clone();
    tokio::task::spawn_blocking(move || repo.take_incident(id, common::FIREFIGHTER_ID))
        .await
        .unwrap()
        .unwrap();

    let row = single
        .wait_until(|row| row.as_ref().is_some_and(|r| r.incident.state == IncidentState::Assigned))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.incident.assigned_to, Some(common::FIREFIGHTER_ID));
    assert_eq!(row.reporter_name.as_deref(), Some("Ciudadano Demo"));

    let mine = assigned.wait_until(|rows| rows.len() == 1).await.unwrap();
    assert_eq!(mine[0].incident.id, Some(id));
    let everything = all
        .wait_until(|rows| rows.iter().any(|r| r.incident.state == IncidentState::Assigned))
        .await
        .unwrap();
    assert_eq!(everything.len(), total);
}
