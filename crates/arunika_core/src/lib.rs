pub mod cache;
pub mod domain;
pub mod echo;
pub mod media;
pub mod ports;
pub mod share;

pub use cache::LocalCache;
pub use domain::{
    Asset, AssetKind, Branding, Category, Course, DeviceType, EditError, Mentor, Module,
    ModuleKind, RemoteConfig, Session, SocialLinks, VisitEvent,
};
pub use echo::EchoSuppressor;
pub use ports::{
    ChangeEvent, ChangeKind, ChangeStream, KeyValueStorage, PortError, PortResult, RealtimeEvent,
    RemoteStore, RemoteStoreFactory, StorageError, Table,
};
pub use share::{course_link, parse_course_link, ShareLinkError, SharedLink};
