#[cfg(feature = "bevy_prototype_debug_lines")]
pub mod draw;

use bevy::{app::PluginGroupBuilder, prelude::PluginGroup};

#[derive(Debug)]
/// Development plugins intended for debug builds use.
pub struct DeveloperPlugins;

impl PluginGroup for DeveloperPlugins {
    fn build(self) -> PluginGroupBuilder {
        #[allow(unused_mut)]
        let mut group = PluginGroupBuilder::start::<Self>();
        #[cfg(feature = "editor")]
        {
            group = group.add(bevy_editor_pls::prelude::EditorPlugin);
        }
        #[cfg(feature = "bevy_prototype_debug_lines")]
        {
            group = group
                .add(bevy_prototype_debug_lines::DebugLinesPlugin::default())
                .add(draw::DebugDrawPlugin);
        }
        group
    }
}
