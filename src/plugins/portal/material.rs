use bevy::{
    prelude::*,
    reflect::TypeUuid,
    render::render_resource::{AsBindGroup, ShaderRef, ShaderType},
};

/// Material of an active portal hole: samples the render target the paired
/// portal's camera draws into, in screen space.
#[derive(AsBindGroup, Debug, Clone, TypeUuid, Reflect)]
#[uuid = "7d9517f9-0b04-4ba4-8b35-0e4420443329"]
pub struct OpenPortalMaterial {
    #[texture(0)]
    #[sampler(1)]
    pub texture: Handle<Image>,
}

impl Material for OpenPortalMaterial {
    fn fragment_shader() -> ShaderRef {
        "shaders/portal_open.wgsl".into()
    }

    fn specialize(
        _pipeline: &bevy::pbr::MaterialPipeline<Self>,
        descriptor: &mut bevy::render::render_resource::RenderPipelineDescriptor,
        _layout: &bevy::render::mesh::MeshVertexBufferLayout,
        _key: bevy::pbr::MaterialPipelineKey<Self>,
    ) -> Result<(), bevy::render::render_resource::SpecializedMeshPipelineError> {
        descriptor.primitive.cull_mode = None;
        Ok(())
    }
}

/// Material of a dormant portal hole, a flat tint while the link is inactive.
#[derive(AsBindGroup, Debug, Clone, TypeUuid, Reflect)]
#[uuid = "b7f693e2-6f8f-4b3e-8fbb-9c4f92f531d6"]
pub struct ClosedPortalMaterial {
    #[uniform(0)]
    pub uniform: ClosedPortalUniform,
}

impl Material for ClosedPortalMaterial {
    fn fragment_shader() -> ShaderRef {
        "shaders/portal_closed.wgsl".into()
    }

    fn specialize(
        _pipeline: &bevy::pbr::MaterialPipeline<Self>,
        descriptor: &mut bevy::render::render_resource::RenderPipelineDescriptor,
        _layout: &bevy::render::mesh::MeshVertexBufferLayout,
        _key: bevy::pbr::MaterialPipelineKey<Self>,
    ) -> Result<(), bevy::render::render_resource::SpecializedMeshPipelineError> {
        descriptor.primitive.cull_mode = None;
        Ok(())
    }
}

#[derive(Debug, Clone, ShaderType, Reflect)]
pub struct ClosedPortalUniform {
    pub color: Color,
}
