mod common;

use common::{config, seeded, user, ROOT, SERVICE_PASSWORD, SERVICE_USERNAME};
use my_data::{
    ApiTokenScope, CredentialsAuthenticator, DataError, DataLoader, DataSet, InitialDataSource,
    JsonDataSource, LoadSummary, MyData, MyDataConfig, StaticDataSource, User, UserAuthenticator,
    UserRole,
};

const CAROL_JSON: &str = r#"{
    "api_scopes": [{"id": 100, "module": "reports", "subject": "retrieve"}],
    "users": [{
        "id": 50,
        "username": "carol",
        "email": "carol@example.com",
        "fullname": "Carol",
        "role": "normal",
        "_password": "carol_pw",
        "_tags": [{"title": "home"}, {"title": "garden"}],
        "_api_clients": [{"id": 60, "app_name": "reporter", "app_publisher": "carol"}],
        "_api_tokens": [{
            "id": 70,
            "title": "reporter",
            "token": "carolReporterToken000000",
            "api_client_id": 60
        }],
        "_user_settings": [{"setting": "theme", "value": "dark"}]
    }],
    "api_token_scopes": [{"api_token_id": 70, "api_scope_id": 100}]
}"#;

fn carol() -> DataSet {
    DataSet::from_json_str(CAROL_JSON).unwrap()
}

fn carol_exists(my_data: &MyData) -> bool {
    match my_data.with_service_context(|context| context.user_by_username("carol")) {
        Ok(_) => true,
        Err(DataError::NotFound { .. }) => false,
        Err(err) => panic!("unexpected error: {err:?}"),
    }
}

#[test]
fn initial_data_summary_counts_every_row() {
    let my_data = MyData::new(&config()).unwrap();
    let summary = my_data.create_init_data().unwrap();
    assert_eq!(
        summary,
        LoadSummary {
            api_scopes: 8,
            users: 6,
            tags: 9,
            api_clients: 4,
            api_tokens: 7,
            user_settings: 9,
            api_token_scopes: 3,
        }
    );

    let scopes = my_data
        .with_service_context(|context| context.api_scopes())
        .unwrap();
    assert_eq!(scopes.len(), 8);
}

#[test]
fn create_init_data_can_be_repeated() {
    let my_data = seeded();
    let summary = my_data.create_init_data().unwrap();
    assert_eq!(summary.users, 6);
}

#[test]
fn loading_twice_is_rejected() {
    let my_data = seeded();
    let err = DataLoader::new(InitialDataSource).load(&my_data).unwrap_err();
    assert!(matches!(err, DataError::Validation(_)));
}

#[test]
fn loaded_rows_keep_ids_and_owners() {
    let my_data = seeded();
    DataLoader::new(StaticDataSource(carol())).load(&my_data).unwrap();

    let carol = user(&my_data, "carol");
    assert_eq!(carol.id, Some(50));

    let mut loaded = carol.clone();
    my_data
        .with_user_context(&carol, |context| context.users().load_relations(&mut loaded))
        .unwrap();
    assert_eq!(loaded.tags().unwrap().len(), 2);
    assert_eq!(loaded.user_settings().unwrap()[0].value, "dark");
    let token = &loaded.api_tokens().unwrap()[0];
    assert_eq!(token.id, Some(70));
    assert_eq!(token.api_client_id, Some(60));
    assert!(token.scope_names().unwrap().contains("reports.retrieve"));

    let authenticated = UserAuthenticator::new(
        &my_data,
        CredentialsAuthenticator::new("carol", "carol_pw"),
    )
    .authenticate()
    .unwrap();
    assert_eq!(authenticated.id, Some(50));
}

#[test]
fn generated_ids_continue_after_loaded_ids() {
    let my_data = seeded();
    let root = user(&my_data, ROOT);
    let created = my_data
        .with_user_context(&root, |context| {
            context
                .users()
                .create_one(User::new("dave", "dave@example.com", "Dave", UserRole::Normal))
        })
        .unwrap();
    assert_eq!(created.id, Some(7));
}

#[test]
fn dangling_scope_links_abort_the_whole_load() {
    let my_data = seeded();
    let mut data_set = carol();
    data_set.api_token_scopes.push(ApiTokenScope {
        id: None,
        api_token_id: 70,
        api_scope_id: 999,
    });

    let err = DataLoader::new(StaticDataSource(data_set))
        .load(&my_data)
        .unwrap_err();
    assert!(matches!(err, DataError::DataLoad(_)));
    assert!(!carol_exists(&my_data));
}

#[test]
fn dangling_token_links_are_rejected() {
    let my_data = seeded();
    let mut data_set = carol();
    data_set.api_token_scopes = vec![ApiTokenScope {
        id: None,
        api_token_id: 999,
        api_scope_id: 100,
    }];

    let err = DataLoader::new(StaticDataSource(data_set))
        .load(&my_data)
        .unwrap_err();
    assert!(matches!(err, DataError::DataLoad(_)));
}

#[test]
fn tokens_must_reference_clients_of_the_same_user() {
    let my_data = seeded();
    let mut data_set = carol();
    data_set.users[0].api_tokens[0].api_client_id = Some(2);

    let err = DataLoader::new(StaticDataSource(data_set))
        .load(&my_data)
        .unwrap_err();
    assert!(matches!(err, DataError::DataLoad(_)));
    assert!(!carol_exists(&my_data));
}

#[test]
fn invalid_records_are_validation_errors() {
    let my_data = seeded();
    let mut data_set = carol();
    data_set.users[0].email = "not-an-email".to_string();

    let err = DataLoader::new(StaticDataSource(data_set))
        .load(&my_data)
        .unwrap_err();
    assert!(matches!(err, DataError::Validation(_)));
}

#[test]
fn json_files_are_loaded_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("carol.json");
    std::fs::write(&path, CAROL_JSON).unwrap();

    let my_data = seeded();
    let summary = DataLoader::new(JsonDataSource::new(&path))
        .load(&my_data)
        .unwrap();
    assert_eq!(summary.users, 1);
    assert_eq!(summary.tags, 2);
    assert_eq!(summary.api_token_scopes, 1);
    assert!(carol_exists(&my_data));
}

#[test]
fn unreadable_json_sources_are_data_load_errors() {
    let dir = tempfile::tempdir().unwrap();
    let my_data = seeded();

    let missing = DataLoader::new(JsonDataSource::new(dir.path().join("missing.json")))
        .load(&my_data)
        .unwrap_err();
    assert!(matches!(missing, DataError::DataLoad(_)));

    let broken_path = dir.path().join("broken.json");
    std::fs::write(&broken_path, "{\"users\": [").unwrap();
    let broken = DataLoader::new(JsonDataSource::new(&broken_path))
        .load(&my_data)
        .unwrap_err();
    assert!(matches!(broken, DataError::DataLoad(_)));
}

#[test]
fn file_databases_persist_between_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("my_data.db");
    let config = MyDataConfig::file(&path).with_service_user(SERVICE_USERNAME, SERVICE_PASSWORD);

    {
        let my_data = MyData::new(&config).unwrap();
        my_data.create_init_data().unwrap();
    }

    let reopened = MyData::new(&config).unwrap();
    let root = user(&reopened, ROOT);
    let tags = reopened
        .with_user_context(&root, |context| context.tags().count(None))
        .unwrap();
    assert_eq!(tags, 9);
}

#[test]
fn separate_memory_stores_do_not_share_rows() {
    let seeded_store = seeded();
    let empty_store = MyData::new(&config()).unwrap();

    assert!(seeded_store
        .with_service_context(|context| context.user_by_username(ROOT))
        .is_ok());
    assert!(matches!(
        empty_store.service_context(),
        Err(DataError::PermissionDenied(_))
    ));
}
