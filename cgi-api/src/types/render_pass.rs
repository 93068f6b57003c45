#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

use super::misc::*;
use crate::{CgiError, CgiResult};

/// One image written or read by a render pass
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CgiAttachment {
    pub name: String,
    pub format: CgiFormat,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub sample_count: CgiSampleCount,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub load_op: CgiLoadOp,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub store_op: CgiStoreOp,
    #[cfg_attr(feature = "serde-support", serde(default = "default_stencil_load_op"))]
    pub stencil_load_op: CgiLoadOp,
    #[cfg_attr(feature = "serde-support", serde(default = "default_stencil_store_op"))]
    pub stencil_store_op: CgiStoreOp,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub initial_layout: CgiImageLayout,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub final_layout: CgiImageLayout,
}

#[cfg(feature = "serde-support")]
fn default_stencil_load_op() -> CgiLoadOp {
    CgiLoadOp::DontCare
}

#[cfg(feature = "serde-support")]
fn default_stencil_store_op() -> CgiStoreOp {
    CgiStoreOp::DontCare
}

impl CgiAttachment {
    pub fn new(
        name: &str,
        format: CgiFormat,
    ) -> Self {
        CgiAttachment {
            name: name.to_string(),
            format,
            sample_count: CgiSampleCount::SampleCount1,
            load_op: CgiLoadOp::Load,
            store_op: CgiStoreOp::Store,
            stencil_load_op: CgiLoadOp::DontCare,
            stencil_store_op: CgiStoreOp::DontCare,
            initial_layout: CgiImageLayout::Undefined,
            final_layout: CgiImageLayout::Undefined,
        }
    }

    pub fn sample_count(
        mut self,
        sample_count: CgiSampleCount,
    ) -> Self {
        self.sample_count = sample_count;
        self
    }

    pub fn load_op_clear(mut self) -> Self {
        self.load_op = CgiLoadOp::Clear;
        self
    }

    pub fn load_op_dont_care(mut self) -> Self {
        self.load_op = CgiLoadOp::DontCare;
        self
    }

    pub fn store_op_dont_care(mut self) -> Self {
        self.store_op = CgiStoreOp::DontCare;
        self
    }

    pub fn stencil_load_op_clear(mut self) -> Self {
        self.stencil_load_op = CgiLoadOp::Clear;
        self
    }

    pub fn stencil_load_op_load(mut self) -> Self {
        self.stencil_load_op = CgiLoadOp::Load;
        self
    }

    pub fn stencil_store_op_store(mut self) -> Self {
        self.stencil_store_op = CgiStoreOp::Store;
        self
    }

    /// The attachment enters and leaves the render pass in the same layout
    pub fn layout(
        self,
        layout: CgiImageLayout,
    ) -> Self {
        self.layout_transition(layout, layout)
    }

    pub fn layout_transition(
        mut self,
        initial_layout: CgiImageLayout,
        final_layout: CgiImageLayout,
    ) -> Self {
        self.initial_layout = initial_layout;
        self.final_layout = final_layout;
        self
    }

    /// True if the render pass clears this attachment on first use
    pub fn clears(&self) -> bool {
        self.load_op == CgiLoadOp::Clear
            || (self.format.has_stencil() && self.stencil_load_op == CgiLoadOp::Clear)
    }
}

/// Reference from a subpass to an attachment, by name, with the layout the subpass needs
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CgiAttachmentRef {
    pub name: String,
    pub layout: CgiImageLayout,
}

impl CgiAttachmentRef {
    pub fn new(
        name: &str,
        layout: CgiImageLayout,
    ) -> Self {
        CgiAttachmentRef {
            name: name.to_string(),
            layout,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CgiSubpass {
    pub name: String,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub input: Vec<CgiAttachmentRef>,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub color: Vec<CgiAttachmentRef>,
    /// Empty, or one entry per color attachment
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub resolve: Vec<CgiAttachmentRef>,
    /// Attachments this subpass does not touch but whose contents must survive it
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub preserve: Vec<String>,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub depth_stencil: Option<CgiAttachmentRef>,
}

impl CgiSubpass {
    pub fn new(name: &str) -> Self {
        CgiSubpass {
            name: name.to_string(),
            input: Vec::default(),
            color: Vec::default(),
            resolve: Vec::default(),
            preserve: Vec::default(),
            depth_stencil: None,
        }
    }

    pub fn input(
        mut self,
        refs: Vec<CgiAttachmentRef>,
    ) -> Self {
        self.input = refs;
        self
    }

    pub fn color(
        mut self,
        refs: Vec<CgiAttachmentRef>,
    ) -> Self {
        self.color = refs;
        self
    }

    pub fn resolve(
        mut self,
        refs: Vec<CgiAttachmentRef>,
    ) -> Self {
        self.resolve = refs;
        self
    }

    pub fn preserve(
        mut self,
        names: &[&str],
    ) -> Self {
        self.preserve = names.iter().map(|name| name.to_string()).collect();
        self
    }

    pub fn depth_stencil(
        mut self,
        depth_stencil: CgiAttachmentRef,
    ) -> Self {
        self.depth_stencil = Some(depth_stencil);
        self
    }
}

/// Synchronization recipe of a dependency between two subpasses
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub enum CgiDependencyMode {
    /// Color output read by later fragment shaders as a texture
    ColorToShaderRead,
    /// Color output read by the next subpass as an input attachment
    ColorToInput,
    /// Depth output read by the next subpass as an input attachment
    DepthToInput,
    /// Full barrier between all graphics stages
    AllGraphics,
}

impl Default for CgiDependencyMode {
    fn default() -> Self {
        CgiDependencyMode::ColorToShaderRead
    }
}

/// Orders two subpasses. A missing subpass name means "outside the render pass".
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CgiDependency {
    pub src_subpass: Option<String>,
    pub dst_subpass: Option<String>,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub mode: CgiDependencyMode,
}

impl CgiDependency {
    pub fn new(
        src_subpass: &str,
        dst_subpass: &str,
    ) -> Self {
        CgiDependency {
            src_subpass: Some(src_subpass.to_string()),
            dst_subpass: Some(dst_subpass.to_string()),
            mode: CgiDependencyMode::default(),
        }
    }

    pub fn external_to(dst_subpass: &str) -> Self {
        CgiDependency {
            src_subpass: None,
            dst_subpass: Some(dst_subpass.to_string()),
            mode: CgiDependencyMode::default(),
        }
    }

    pub fn to_external(src_subpass: &str) -> Self {
        CgiDependency {
            src_subpass: Some(src_subpass.to_string()),
            dst_subpass: None,
            mode: CgiDependencyMode::default(),
        }
    }

    pub fn mode(
        mut self,
        mode: CgiDependencyMode,
    ) -> Self {
        self.mode = mode;
        self
    }
}

/// Declarative description of a render pass: attachments, subpasses in execution order, and the
/// dependencies between them
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct CgiRenderPassDef {
    pub attachments: Vec<CgiAttachment>,
    pub subpasses: Vec<CgiSubpass>,
    #[cfg_attr(feature = "serde-support", serde(default))]
    pub dependencies: Vec<CgiDependency>,
}

/// A subpass with attachment names resolved to attachment indices
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CgiResolvedSubpass {
    pub input: Vec<(u32, CgiImageLayout)>,
    pub color: Vec<(u32, CgiImageLayout)>,
    pub resolve: Vec<(u32, CgiImageLayout)>,
    pub preserve: Vec<u32>,
    pub depth_stencil: Option<(u32, CgiImageLayout)>,
}

impl CgiResolvedSubpass {
    /// Layout the subpass requires for an attachment, if it references it
    pub fn referenced_layout(
        &self,
        attachment_index: u32,
    ) -> Option<CgiImageLayout> {
        self.input
            .iter()
            .chain(self.color.iter())
            .chain(self.resolve.iter())
            .chain(self.depth_stencil.iter())
            .find(|(index, _)| *index == attachment_index)
            .map(|(_, layout)| *layout)
    }

    /// True if the subpass writes the attachment as a color, resolve or depth target
    pub fn renders_to(
        &self,
        attachment_index: u32,
    ) -> bool {
        self.color
            .iter()
            .chain(self.resolve.iter())
            .chain(self.depth_stencil.iter())
            .any(|(index, _)| *index == attachment_index)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CgiResolvedDependency {
    pub src_subpass: Option<u32>,
    pub dst_subpass: Option<u32>,
    pub mode: CgiDependencyMode,
}

/// Validated, index-based form of a `CgiRenderPassDef`
#[derive(Clone, Debug, PartialEq)]
pub struct CgiRenderPassLayout {
    pub subpasses: Vec<CgiResolvedSubpass>,
    pub dependencies: Vec<CgiResolvedDependency>,
    /// `subpass_layouts[subpass][attachment]`: the layout every attachment is in while the subpass
    /// runs. Attachments a subpass does not reference keep the layout they were in before it.
    pub subpass_layouts: Vec<Vec<CgiImageLayout>>,
    /// First subpass that renders to each attachment. Clears happen there.
    pub first_render_subpass: Vec<Option<u32>>,
}

impl CgiRenderPassDef {
    pub fn new(
        attachments: Vec<CgiAttachment>,
        subpasses: Vec<CgiSubpass>,
        dependencies: Vec<CgiDependency>,
    ) -> Self {
        CgiRenderPassDef {
            attachments,
            subpasses,
            dependencies,
        }
    }

    #[cfg(feature = "serde-support")]
    pub fn from_ron(text: &str) -> CgiResult<Self> {
        let def: CgiRenderPassDef = ron::de::from_str(text).map_err(|e| {
            CgiError::ContentError(format!("could not parse render pass definition: {}", e))
        })?;
        def.validate()?;
        Ok(def)
    }

    pub fn attachment_index(
        &self,
        name: &str,
    ) -> Option<u32> {
        self.attachments
            .iter()
            .position(|attachment| attachment.name == name)
            .map(|index| index as u32)
    }

    pub fn subpass_index(
        &self,
        name: &str,
    ) -> Option<u32> {
        self.subpasses
            .iter()
            .position(|subpass| subpass.name == name)
            .map(|index| index as u32)
    }

    fn resolve_ref(
        &self,
        subpass: &CgiSubpass,
        attachment_ref: &CgiAttachmentRef,
    ) -> CgiResult<(u32, CgiImageLayout)> {
        let index = self.attachment_index(&attachment_ref.name).ok_or_else(|| {
            CgiError::ContentError(format!(
                "subpass {} references unknown attachment {}",
                subpass.name, attachment_ref.name
            ))
        })?;
        Ok((index, attachment_ref.layout))
    }

    fn resolve_subpass(
        &self,
        subpass: &CgiSubpass,
    ) -> CgiResult<CgiResolvedSubpass> {
        let resolve_refs = |refs: &[CgiAttachmentRef]| -> CgiResult<Vec<(u32, CgiImageLayout)>> {
            refs.iter()
                .map(|attachment_ref| self.resolve_ref(subpass, attachment_ref))
                .collect()
        };

        let resolved = CgiResolvedSubpass {
            input: resolve_refs(&subpass.input)?,
            color: resolve_refs(&subpass.color)?,
            resolve: resolve_refs(&subpass.resolve)?,
            preserve: subpass
                .preserve
                .iter()
                .map(|name| {
                    self.attachment_index(name).ok_or_else(|| {
                        CgiError::ContentError(format!(
                            "subpass {} preserves unknown attachment {}",
                            subpass.name, name
                        ))
                    })
                })
                .collect::<CgiResult<Vec<_>>>()?,
            depth_stencil: subpass
                .depth_stencil
                .as_ref()
                .map(|attachment_ref| self.resolve_ref(subpass, attachment_ref))
                .transpose()?,
        };

        if !resolved.resolve.is_empty() && resolved.resolve.len() != resolved.color.len() {
            return Err(CgiError::ContentError(format!(
                "subpass {} has {} resolve attachments but {} color attachments",
                subpass.name,
                resolved.resolve.len(),
                resolved.color.len()
            )));
        }

        for (index, _) in resolved.color.iter().chain(resolved.resolve.iter()) {
            if self.attachments[*index as usize].format.is_depth() {
                return Err(CgiError::ContentError(format!(
                    "subpass {} uses depth attachment {} as a color target",
                    subpass.name, self.attachments[*index as usize].name
                )));
            }
        }

        if let Some((index, _)) = resolved.depth_stencil {
            if !self.attachments[index as usize].format.is_depth() {
                return Err(CgiError::ContentError(format!(
                    "subpass {} uses color attachment {} as depth-stencil",
                    subpass.name, self.attachments[index as usize].name
                )));
            }
        }

        // An attachment may be referenced more than once (input + depth read), but only with one
        // layout
        let all_refs: Vec<(u32, CgiImageLayout)> = resolved
            .input
            .iter()
            .chain(resolved.color.iter())
            .chain(resolved.resolve.iter())
            .chain(resolved.depth_stencil.iter())
            .cloned()
            .collect();
        for (i, (index, layout)) in all_refs.iter().enumerate() {
            for (other_index, other_layout) in &all_refs[i + 1..] {
                if index == other_index && layout != other_layout {
                    return Err(CgiError::ContentError(format!(
                        "subpass {} references attachment {} as both {:?} and {:?}",
                        subpass.name,
                        self.attachments[*index as usize].name,
                        layout,
                        other_layout
                    )));
                }
            }
        }

        for preserved in &resolved.preserve {
            if all_refs.iter().any(|(index, _)| index == preserved) {
                return Err(CgiError::ContentError(format!(
                    "subpass {} both uses and preserves attachment {}",
                    subpass.name, self.attachments[*preserved as usize].name
                )));
            }
        }

        Ok(resolved)
    }

    fn resolve_dependency(
        &self,
        dependency: &CgiDependency,
    ) -> CgiResult<CgiResolvedDependency> {
        let lookup = |name: &Option<String>| -> CgiResult<Option<u32>> {
            match name {
                Some(name) => self.subpass_index(name).map(Some).ok_or_else(|| {
                    CgiError::ContentError(format!(
                        "dependency references unknown subpass {}",
                        name
                    ))
                }),
                None => Ok(None),
            }
        };

        let src_subpass = lookup(&dependency.src_subpass)?;
        let dst_subpass = lookup(&dependency.dst_subpass)?;
        match (src_subpass, dst_subpass) {
            (None, None) => {
                return Err(CgiError::ContentError(
                    "a dependency needs at least one subpass inside the render pass".to_string(),
                ))
            }
            (Some(src), Some(dst)) if src > dst => {
                return Err(CgiError::ContentError(format!(
                    "dependency from subpass {} to earlier subpass {}",
                    src, dst
                )))
            }
            _ => {}
        }

        Ok(CgiResolvedDependency {
            src_subpass,
            dst_subpass,
            mode: dependency.mode,
        })
    }

    /// Check the definition and resolve every name to an index
    pub fn validate(&self) -> CgiResult<CgiRenderPassLayout> {
        if self.subpasses.is_empty() {
            return Err(CgiError::ContentError(
                "a render pass needs at least one subpass".to_string(),
            ));
        }

        for (i, attachment) in self.attachments.iter().enumerate() {
            if attachment.format == CgiFormat::Undefined {
                return Err(CgiError::ContentError(format!(
                    "attachment {} has no format",
                    attachment.name
                )));
            }
            if self.attachments[..i]
                .iter()
                .any(|other| other.name == attachment.name)
            {
                return Err(CgiError::ContentError(format!(
                    "attachment name {} is used twice",
                    attachment.name
                )));
            }
        }

        for (i, subpass) in self.subpasses.iter().enumerate() {
            if self.subpasses[..i]
                .iter()
                .any(|other| other.name == subpass.name)
            {
                return Err(CgiError::ContentError(format!(
                    "subpass name {} is used twice",
                    subpass.name
                )));
            }
        }

        let subpasses = self
            .subpasses
            .iter()
            .map(|subpass| self.resolve_subpass(subpass))
            .collect::<CgiResult<Vec<_>>>()?;

        let dependencies = self
            .dependencies
            .iter()
            .map(|dependency| self.resolve_dependency(dependency))
            .collect::<CgiResult<Vec<_>>>()?;

        let mut subpass_layouts = Vec::with_capacity(subpasses.len());
        let mut current: Vec<CgiImageLayout> = self
            .attachments
            .iter()
            .map(|attachment| attachment.initial_layout)
            .collect();
        for subpass in &subpasses {
            for (attachment_index, layout) in current.iter_mut().enumerate() {
                if let Some(referenced) = subpass.referenced_layout(attachment_index as u32) {
                    *layout = referenced;
                }
            }
            subpass_layouts.push(current.clone());
        }

        let first_render_subpass = (0..self.attachments.len() as u32)
            .map(|attachment_index| {
                subpasses
                    .iter()
                    .position(|subpass| subpass.renders_to(attachment_index))
                    .map(|index| index as u32)
            })
            .collect();

        Ok(CgiRenderPassLayout {
            subpasses,
            dependencies,
            subpass_layouts,
            first_render_subpass,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gbuffer_pass() -> CgiRenderPassDef {
        CgiRenderPassDef::new(
            vec![
                CgiAttachment::new("Albedo", CgiFormat::R8G8B8A8Srgb)
                    .load_op_clear()
                    .layout(CgiImageLayout::FsReadOnly),
                CgiAttachment::new("Depth", CgiFormat::D32Sfloat)
                    .load_op_clear()
                    .layout(CgiImageLayout::DepthStencilReadOnly),
                CgiAttachment::new("Light", CgiFormat::R16G16B16A16Sfloat)
                    .load_op_clear()
                    .layout(CgiImageLayout::FsReadOnly),
            ],
            vec![
                CgiSubpass::new("GBuffer")
                    .color(vec![CgiAttachmentRef::new(
                        "Albedo",
                        CgiImageLayout::ColorAttachment,
                    )])
                    .depth_stencil(CgiAttachmentRef::new(
                        "Depth",
                        CgiImageLayout::DepthStencilAttachment,
                    )),
                CgiSubpass::new("Lighting")
                    .input(vec![
                        CgiAttachmentRef::new("Albedo", CgiImageLayout::FsReadOnly),
                        CgiAttachmentRef::new("Depth", CgiImageLayout::DepthStencilReadOnly),
                    ])
                    .color(vec![CgiAttachmentRef::new(
                        "Light",
                        CgiImageLayout::ColorAttachment,
                    )])
                    .depth_stencil(CgiAttachmentRef::new(
                        "Depth",
                        CgiImageLayout::DepthStencilReadOnly,
                    )),
            ],
            vec![CgiDependency::new("GBuffer", "Lighting").mode(CgiDependencyMode::ColorToInput)],
        )
    }

    #[test]
    fn resolves_names_and_inherits_layouts() {
        let layout = gbuffer_pass().validate().unwrap();
        assert_eq!(layout.subpasses.len(), 2);
        assert_eq!(layout.subpasses[0].color, vec![(0, CgiImageLayout::ColorAttachment)]);
        assert_eq!(
            layout.subpass_layouts[0],
            vec![
                CgiImageLayout::ColorAttachment,
                CgiImageLayout::DepthStencilAttachment,
                // Not referenced in the first subpass, still in its initial layout
                CgiImageLayout::FsReadOnly,
            ]
        );
        assert_eq!(
            layout.subpass_layouts[1],
            vec![
                CgiImageLayout::FsReadOnly,
                CgiImageLayout::DepthStencilReadOnly,
                CgiImageLayout::ColorAttachment,
            ]
        );
        assert_eq!(layout.first_render_subpass, vec![Some(0), Some(0), Some(1)]);
        assert_eq!(layout.dependencies[0].src_subpass, Some(0));
        assert_eq!(layout.dependencies[0].dst_subpass, Some(1));
    }

    #[test]
    fn unknown_attachment_is_rejected() {
        let mut def = gbuffer_pass();
        def.subpasses[0].color[0].name = "Missing".to_string();
        assert!(matches!(def.validate(), Err(CgiError::ContentError(_))));
    }

    #[test]
    fn conflicting_layouts_are_rejected() {
        let mut def = gbuffer_pass();
        def.subpasses[1].input[1].layout = CgiImageLayout::DepthStencilAttachment;
        assert!(def.validate().is_err());
    }

    #[test]
    fn depth_format_as_color_is_rejected() {
        let mut def = gbuffer_pass();
        def.subpasses[0].color[0].name = "Depth".to_string();
        def.subpasses[0].depth_stencil = None;
        assert!(def.validate().is_err());
    }

    #[test]
    fn backwards_dependency_is_rejected() {
        let mut def = gbuffer_pass();
        def.dependencies = vec![CgiDependency::new("Lighting", "GBuffer")];
        assert!(def.validate().is_err());
    }

    #[test]
    fn preserve_must_not_overlap_use() {
        let mut def = gbuffer_pass();
        def.subpasses[1] = def.subpasses[1].clone().preserve(&["Light"]);
        assert!(def.validate().is_err());
    }

    #[cfg(feature = "serde-support")]
    #[test]
    fn loads_from_ron() {
        let text = r#"(
            attachments: [
                (name: "Color", format: R8G8B8A8Unorm, load_op: Clear,
                 initial_layout: ColorAttachment, final_layout: XsReadOnly),
            ],
            subpasses: [
                (name: "Main", color: [(name: "Color", layout: ColorAttachment)]),
            ],
        )"#;
        let def = CgiRenderPassDef::from_ron(text).unwrap();
        assert_eq!(def.attachments[0].load_op, CgiLoadOp::Clear);
        assert_eq!(def.attachments[0].stencil_load_op, CgiLoadOp::DontCare);
        assert_eq!(def.subpasses[0].color.len(), 1);

        assert!(matches!(
            CgiRenderPassDef::from_ron("(attachments: [oops"),
            Err(CgiError::ContentError(_))
        ));
    }
}
