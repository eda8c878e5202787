pub(super) mod db;
pub(super) mod demo;
pub(super) mod directory;
pub(super) mod init;
pub(super) mod inspect;
pub(super) mod join;
pub(super) mod server;
pub(super) mod table;
