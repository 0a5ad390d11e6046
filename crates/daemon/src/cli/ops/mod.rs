pub mod ls;
pub mod mount;
pub mod stat;

crate::command_enum! {
    (Mount, mount::Mount),
    (Stat, stat::Stat),
    (Ls, ls::Ls),
}
