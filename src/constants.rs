pub const DEFAULT_PAGE_SIZE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const MIN_COOKING_TIME: i64 = 1;
pub const MAX_COOKING_TIME: i64 = 300;

// Postgres caps a statement at 65535 binds; link rows bind 2 and 3 values each
pub const MAX_RECIPE_TAGS: usize = 65535 / 2;
pub const MAX_RECIPE_INGREDIENTS: usize = 65535 / 3;

pub const MIN_AMOUNT: i64 = 1;
pub const MAX_AMOUNT: i64 = 10_000;

pub const RECIPE_NAME_MAX_CHARS: usize = 200;
pub const RECIPES_MAX_CHARS: usize = 200;
pub const TAG_SLUG_MAX_CHARS: usize = 200;
pub const HEX_MAX_CHARS: usize = 9;

pub const USER_MAX_CHARS: usize = 150;
pub const EMAIL_MAX_CHARS: usize = 254;
pub const PASSWORD_MIN_CHARS: usize = 8;

pub const FORBIDDEN_USERNAMES: &[&str] = &["me"];

pub const IMAGE_DIR: &str = "recipes/images";
pub const IMAGE_EXTENSIONS: &[(&str, &str)] = &[
    ("png", "png"),
    ("jpeg", "jpg"),
    ("jpg", "jpg"),
    ("gif", "gif"),
    ("webp", "webp"),
];

pub const SHOPPING_LIST_HEADER: &str = "Shopping list";

pub const RECIPE_EXISTS: &str = "Such a recipe already exists! Change the name";
