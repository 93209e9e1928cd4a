mod common;

use common::{seeded, user, NORMAL_USER_1, NORMAL_USER_2, ROOT};
use my_data::{
    ApiClient, ApiToken, DataError, Filter, RetrieveQuery, Sort, Tag, User, UserRole, UserSetting,
};

#[test]
fn normal_user_retrieves_only_own_rows() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    let context = my_data.user_context(&nu1).unwrap();

    let tags = context.tags().retrieve_all().unwrap();
    assert_eq!(tags.len(), 3);
    assert!(tags.iter().all(|tag| tag.user_id == nu1.id));

    let users = context.users().retrieve_all().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].username, NORMAL_USER_1);

    let settings = context.user_settings().retrieve_all().unwrap();
    assert!(settings.iter().all(|setting| setting.user_id == nu1.id));
}

#[test]
fn root_retrieves_rows_of_every_owner() {
    let my_data = seeded();
    let root = user(&my_data, ROOT);
    let context = my_data.user_context(&root).unwrap();

    assert_eq!(context.tags().count(None).unwrap(), 9);
    assert_eq!(context.users().retrieve_all().unwrap().len(), 6);

    let owners: std::collections::BTreeSet<_> = context
        .api_tokens()
        .retrieve_all()
        .unwrap()
        .into_iter()
        .filter_map(|token| token.user_id)
        .collect();
    assert_eq!(owners.len(), 3);
}

#[test]
fn created_rows_are_owned_by_the_principal_even_when_input_claims_otherwise() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    let nu2 = user(&my_data, NORMAL_USER_2);

    let context = my_data.user_context(&nu1).unwrap();
    let mut tag = Tag::new("forged");
    tag.user_id = nu2.id;
    let created = context.tags().create_one(tag).unwrap();
    assert_eq!(created.user_id, nu1.id);
    assert!(created.id.is_some());
    context.commit().unwrap();

    let context = my_data.user_context(&nu2).unwrap();
    let forged = context
        .tags()
        .retrieve(&RetrieveQuery::from(Filter::eq("title", "forged")))
        .unwrap();
    assert!(forged.is_empty());
}

#[test]
fn foreign_rows_cannot_be_read_updated_or_deleted() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    let nu2 = user(&my_data, NORMAL_USER_2);

    let foreign_tag = {
        let context = my_data.user_context(&nu2).unwrap();
        context.tags().retrieve_all().unwrap().remove(0)
    };
    let foreign_id = foreign_tag.id.unwrap();

    let context = my_data.user_context(&nu1).unwrap();
    assert!(context.tags().get(foreign_id).unwrap().is_none());

    let mut renamed = foreign_tag.clone();
    renamed.title = "stolen".to_string();
    assert!(matches!(
        context.tags().update_one(renamed),
        Err(DataError::PermissionDenied(_))
    ));
    assert!(matches!(
        context.tags().delete_one(&foreign_tag),
        Err(DataError::PermissionDenied(_))
    ));
    drop(context);

    let context = my_data.user_context(&nu2).unwrap();
    let stored = context.tags().get(foreign_id).unwrap().unwrap();
    assert_eq!(stored.title, foreign_tag.title);
}

#[test]
fn count_matches_retrieve_for_the_same_filter() {
    let my_data = seeded();
    for username in [ROOT, NORMAL_USER_1, NORMAL_USER_2] {
        let principal = user(&my_data, username);
        let context = my_data.user_context(&principal).unwrap();
        for filter in [
            None,
            Some(Filter::like("title", "%tag_1")),
            Some(Filter::or([
                Filter::like("title", "root%"),
                Filter::like("title", "normal_user_2%"),
            ])),
        ] {
            let query = RetrieveQuery {
                filter: filter.clone(),
                ..RetrieveQuery::default()
            };
            let retrieved = context.tags().retrieve(&query).unwrap();
            let counted = context.tags().count(filter.as_ref()).unwrap();
            assert_eq!(counted, retrieved.len() as u64, "user {username}");
        }
    }
}

#[test]
fn retrieve_supports_sort_and_pagination() {
    let my_data = seeded();
    let root = user(&my_data, ROOT);
    let context = my_data.user_context(&root).unwrap();

    let all = context
        .tags()
        .retrieve(&RetrieveQuery::new().with_sort(Sort::desc("id")))
        .unwrap();
    let page = context
        .tags()
        .retrieve(
            &RetrieveQuery::new()
                .with_sort(Sort::desc("id"))
                .with_start(2)
                .with_max_items(3),
        )
        .unwrap();
    assert_eq!(page.len(), 3);
    assert_eq!(page[0].id, all[2].id);

    let tail = context
        .tags()
        .retrieve(&RetrieveQuery::new().with_start(7))
        .unwrap();
    assert_eq!(tail.len(), 2);
}

#[test]
fn unknown_filter_columns_are_validation_errors() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    let context = my_data.user_context(&nu1).unwrap();
    let err = context
        .tags()
        .count(Some(&Filter::eq("owner", 1_i64)))
        .unwrap_err();
    assert!(matches!(err, DataError::Validation(_)));
}

#[test]
fn duplicate_unique_fields_are_validation_errors() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    let context = my_data.user_context(&nu1).unwrap();
    let err = context
        .tags()
        .create_one(Tag::new("normal_user_1_tag_1"))
        .unwrap_err();
    assert!(matches!(err, DataError::Validation(_)));
}

#[test]
fn only_root_creates_and_deletes_users() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    let root = user(&my_data, ROOT);

    let context = my_data.user_context(&nu1).unwrap();
    let err = context
        .users()
        .create_one(User::new("eve", "eve@example.com", "Eve", UserRole::Normal))
        .unwrap_err();
    assert!(matches!(err, DataError::PermissionDenied(_)));
    assert!(matches!(
        context.users().delete_one(&nu1),
        Err(DataError::PermissionDenied(_))
    ));
    drop(context);

    let context = my_data.user_context(&root).unwrap();
    let eve = context
        .users()
        .create_one(User::new("eve", "eve@example.com", "Eve", UserRole::Normal))
        .unwrap();
    assert!(eve.id.is_some());
    assert!(matches!(
        context.users().delete_one(&root),
        Err(DataError::PermissionDenied(_))
    ));
    context.users().delete_one(&eve).unwrap();
    assert!(matches!(
        context.users().delete_one(&eve),
        Err(DataError::NotFound { .. })
    ));
}

#[test]
fn deleting_a_user_cascades_to_owned_rows() {
    let my_data = seeded();
    let root = user(&my_data, ROOT);
    let nu2 = user(&my_data, NORMAL_USER_2);

    let context = my_data.user_context(&root).unwrap();
    context.users().delete_one(&nu2).unwrap();
    let remaining = context
        .tags()
        .count(Some(&Filter::eq("user_id", nu2.id)))
        .unwrap();
    assert_eq!(remaining, 0);
    assert_eq!(
        context
            .api_tokens()
            .count(Some(&Filter::eq("user_id", nu2.id)))
            .unwrap(),
        0
    );
}

#[test]
fn normal_user_can_update_own_profile_but_not_role() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    let context = my_data.user_context(&nu1).unwrap();

    let mut profile = nu1.clone();
    profile.fullname = "Renamed".to_string();
    let updated = context.users().update_one(profile).unwrap();
    assert_eq!(updated.fullname, "Renamed");

    let mut promoted = updated.clone();
    promoted.role = UserRole::Root;
    assert!(matches!(
        context.users().update_one(promoted),
        Err(DataError::PermissionDenied(_))
    ));
}

#[test]
fn update_keeps_the_stored_owner() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    let nu2 = user(&my_data, NORMAL_USER_2);
    let context = my_data.user_context(&nu1).unwrap();

    let mut setting = context.user_settings().retrieve_all().unwrap().remove(0);
    setting.user_id = nu2.id;
    setting.value = "changed".to_string();
    let updated = context.user_settings().update_one(setting).unwrap();
    assert_eq!(updated.user_id, nu1.id);

    let stored = context
        .user_settings()
        .get(updated.id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(stored.value, "changed");
    assert_eq!(stored.user_id, nu1.id);
}

#[test]
fn returned_tags_match_the_stored_rows() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    let context = my_data.user_context(&nu1).unwrap();

    let created = context.tags().create_one(Tag::new("  padded  ")).unwrap();
    assert_eq!(created.title, "padded");
    assert_eq!(
        context.tags().get(created.id.unwrap()).unwrap().as_ref(),
        Some(&created)
    );
    let by_title = Filter::eq("title", created.title.as_str());
    assert_eq!(context.tags().count(Some(&by_title)).unwrap(), 1);

    let mut renamed = created.clone();
    renamed.title = " renamed\t".to_string();
    let updated = context.tags().update_one(renamed).unwrap();
    assert_eq!(updated.title, "renamed");
    assert_eq!(
        context.tags().get(updated.id.unwrap()).unwrap(),
        Some(updated)
    );
}

#[test]
fn updating_a_missing_row_is_not_found() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    let context = my_data.user_context(&nu1).unwrap();

    let mut ghost = UserSetting::new("ghost", "value");
    ghost.id = Some(9_999);
    assert!(matches!(
        context.user_settings().update_one(ghost),
        Err(DataError::NotFound { .. })
    ));
}

#[test]
fn tokens_cannot_reference_foreign_api_clients() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    let nu2 = user(&my_data, NORMAL_USER_2);

    let foreign_client_id = {
        let context = my_data.user_context(&nu2).unwrap();
        context.api_clients().retrieve_all().unwrap()[0].id
    };

    let context = my_data.user_context(&nu1).unwrap();
    let own_client = context
        .api_clients()
        .create_one(ApiClient::new("cli", "me"))
        .unwrap();

    let mut token = ApiToken::new("bound");
    token.api_client_id = own_client.id;
    assert!(context.api_tokens().create_one(token).is_ok());

    let mut token = ApiToken::new("hijack");
    token.api_client_id = foreign_client_id;
    assert!(matches!(
        context.api_tokens().create_one(token),
        Err(DataError::Validation(_))
    ));
}

#[test]
fn scopes_can_be_assigned_to_own_tokens() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    let context = my_data.user_context(&nu1).unwrap();

    let mut token = context
        .api_tokens()
        .create_one(ApiToken::new("reporting"))
        .unwrap();
    context
        .assign_token_scopes(&token, &["tags.retrieve", "users.retrieve"])
        .unwrap();
    assert!(matches!(
        context.assign_token_scopes(&token, &["nope.nothing"]),
        Err(DataError::NotFound { .. })
    ));

    context.api_tokens().load_relations(&mut token).unwrap();
    let names: Vec<String> = token.scope_names().unwrap().into_iter().collect();
    assert_eq!(names, vec!["tags.retrieve", "users.retrieve"]);
}

#[test]
fn relations_are_detached_until_loaded() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    assert!(matches!(
        nu1.tags(),
        Err(DataError::DetachedEntity("user.tags"))
    ));

    let mut loaded = nu1.clone();
    {
        let context = my_data.user_context(&nu1).unwrap();
        context.users().load_relations(&mut loaded).unwrap();
    }
    assert_eq!(loaded.tags().unwrap().len(), 3);
    assert_eq!(loaded.api_clients().unwrap().len(), 2);
    assert_eq!(loaded.user_settings().unwrap().len(), 3);

    let long_lived = loaded
        .api_tokens()
        .unwrap()
        .iter()
        .find(|token| token.title == "normal_user_1_long_lived")
        .unwrap();
    assert_eq!(long_lived.scopes().unwrap().len(), 1);
}

#[test]
fn foreign_relations_cannot_be_loaded() {
    let my_data = seeded();
    let nu1 = user(&my_data, NORMAL_USER_1);
    let mut nu2 = user(&my_data, NORMAL_USER_2);

    let context = my_data.user_context(&nu1).unwrap();
    assert!(matches!(
        context.users().load_relations(&mut nu2),
        Err(DataError::PermissionDenied(_))
    ));
}
