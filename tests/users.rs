use nepse_today::users::{self, NewUser, UserError, UserStore};

mod common;

#[test]
fn create_then_find_by_credentials() {
    let (_db, pool) = common::setup_db();
    let mut conn = pool.get().unwrap();

    let user = users::create_user(
        &mut conn,
        &NewUser {
            username: "sita",
            password: "pokhara123",
        },
    )
    .expect("insert user");
    assert!(user.id > 0);
    assert_eq!(user.username, "sita");

    let found = users::find_by_credentials(&mut conn, "sita", "pokhara123").unwrap();
    assert_eq!(found, Some(user.clone()));

    let by_name = users::find_by_username(&mut conn, "sita").unwrap();
    assert_eq!(by_name, Some(user));
}

#[test]
fn wrong_password_or_unknown_user_finds_nothing() {
    let (_db, pool) = common::setup_db();
    let mut conn = pool.get().unwrap();
    users::create_user(
        &mut conn,
        &NewUser {
            username: "hari",
            password: "secret",
        },
    )
    .unwrap();

    assert_eq!(users::find_by_credentials(&mut conn, "hari", "Secret").unwrap(), None);
    assert_eq!(users::find_by_credentials(&mut conn, "gita", "secret").unwrap(), None);
    assert_eq!(users::find_by_username(&mut conn, "gita").unwrap(), None);
}

#[test]
fn duplicate_username_is_rejected() {
    let (_db, pool) = common::setup_db();
    let mut conn = pool.get().unwrap();
    let new_user = NewUser {
        username: "ram",
        password: "one",
    };
    users::create_user(&mut conn, &new_user).unwrap();

    let err = users::create_user(
        &mut conn,
        &NewUser {
            username: "ram",
            password: "two",
        },
    )
    .unwrap_err();
    assert!(matches!(err, UserError::UsernameTaken(ref name) if name == "ram"));
}

#[tokio::test]
async fn store_registers_and_authenticates() {
    let (_db, pool) = common::setup_db();
    let store = UserStore::new(pool);

    let user = store.register("maya".into(), "kathmandu".into()).await.unwrap();

    let ok = store.authenticate("maya".into(), "kathmandu".into()).await.unwrap();
    assert_eq!(ok.map(|u| u.id), Some(user.id));

    let bad = store.authenticate("maya".into(), "lalitpur".into()).await.unwrap();
    assert!(bad.is_none());

    assert!(store.find("maya".into()).await.unwrap().is_some());

    let dup = store.register("maya".into(), "other".into()).await.unwrap_err();
    assert!(matches!(dup, UserError::UsernameTaken(_)));
}
