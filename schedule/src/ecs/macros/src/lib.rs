mod label;
mod marker;

use proc_macro::TokenStream;

#[proc_macro_derive(Component)]
pub fn derive_component(item: TokenStream) -> TokenStream {
    marker::derive_marker(item, "Component")
}

#[proc_macro_derive(Resource)]
pub fn derive_resource(item: TokenStream) -> TokenStream {
    marker::derive_marker(item, "Resource")
}

#[proc_macro_derive(SystemSet)]
pub fn derive_system_set(item: TokenStream) -> TokenStream {
    label::derive_label(item, "SystemSet")
}

#[proc_macro_derive(ScheduleLabel)]
pub fn derive_schedule_label(item: TokenStream) -> TokenStream {
    label::derive_label(item, "ScheduleLabel")
}
