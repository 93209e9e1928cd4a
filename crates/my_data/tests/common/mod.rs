#![allow(dead_code)]

use my_data::{MyData, MyDataConfig, User};

pub const SERVICE_USERNAME: &str = "service.user";
pub const SERVICE_PASSWORD: &str = "service_password";

pub const ROOT: &str = "root";
pub const NORMAL_USER_1: &str = "normal.user.1";
pub const NORMAL_USER_2: &str = "normal.user.2";
pub const MFA_USER: &str = "mfa.user";
pub const DISABLED_USER: &str = "disabled.user";

/// Base32 second-factor secret of `mfa.user` in the initial data set.
pub const MFA_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

pub const ROOT_SHORT_LIVED: &str = "rootShortLived000000000000000001";
pub const NU1_SHORT_LIVED: &str = "nu1ShortLived0000000000000000002";
pub const NU1_LONG_LIVED: &str = "nu1LongLived00000000000000000003";
pub const NU1_DISABLED: &str = "nu1Disabled000000000000000000004";
pub const NU1_EXPIRED: &str = "nu1Expired0000000000000000000005";
pub const NU2_LONG_LIVED: &str = "aRlIytpyz61JX2TvczLxJZUsRzk578pE";

pub fn config() -> MyDataConfig {
    MyDataConfig::memory().with_service_user(SERVICE_USERNAME, SERVICE_PASSWORD)
}

/// In-memory store loaded with the initial data set.
pub fn seeded() -> MyData {
    let my_data = MyData::new(&config()).unwrap();
    my_data.create_init_data().unwrap();
    my_data
}

pub fn user(my_data: &MyData, username: &str) -> User {
    my_data
        .with_service_context(|context| context.user_by_username(username))
        .unwrap()
}
