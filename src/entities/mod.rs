pub mod action;
pub mod control;
pub mod resource;
pub mod role;
pub mod role_tag;
pub mod tag;
pub mod tcontrol;

pub use action::Entity as Action;
pub use control::Entity as Control;
pub use resource::Entity as Resource;
pub use role::Entity as Role;
pub use role_tag::Entity as RoleTag;
pub use tag::Entity as Tag;
pub use tcontrol::Entity as Tcontrol;
