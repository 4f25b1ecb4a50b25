pub const OBJECT_NAMASTE_FILE: &str = "0=ocfl_object_1.0";
pub const OBJECT_NAMASTE_CONTENT: &str = "ocfl_object_1.0\n";
pub const INVENTORY_FILE: &str = "inventory.json";
pub const INVENTORY_TYPE: &str = "https://ocfl.io/1.0/spec/#inventory";

pub const DEFAULT_CONTENT_DIR: &str = "content";

pub const EXTENSIONS_DIR: &str = "extensions";
pub const MUTABLE_HEAD_EXT_DIR: &str = "extensions/0005-mutable-head";
pub const MUTABLE_HEAD_DIR: &str = "extensions/0005-mutable-head/head";
pub const MUTABLE_HEAD_CONTENT_DIR: &str = "extensions/0005-mutable-head/head/content";

/// Store-root extension directories owned by focfl
pub const PREPARE_EXTENSION: &str = "0098-focfl-prepare";
pub const LOCKS_EXTENSION: &str = "0099-focfl-locks";
pub const INDEX_EXTENSION: &str = "0100-focfl-index";
pub const INDEX_FILE: &str = "index.json";

/// Fedora resource file names within an OCFL object
pub const CONTAINER_BODY_FILE: &str = "fcr-container.nt";
pub const HEADERS_DIR: &str = ".fcrepo";
pub const ROOT_HEADERS_FILE: &str = "fcr-root.json";
pub const HEADERS_SUFFIX: &str = ".json";

/// Pseudo commit target used when the resource index fails to commit after objects have
/// been committed
pub const INDEX_COMMIT_TARGET: &str = "fedora-ocfl-index";
