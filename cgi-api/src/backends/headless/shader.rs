use super::internal::preprocessor::{has_entry_point, Preprocessor};
use super::internal::{
    CgiDescriptor, CgiDescriptorHeap, CgiGpuAddress, CgiNativeCommand, CgiPipelineBindPoint,
};
use super::root_signature::try_root_constants;
use super::{
    CgiDeviceContextHeadless, CgiFrameInfo, CgiFrameListener, CgiRootSignatureHeadless,
    CgiTextureHeadless,
};
use crate::{
    CgiComplexSetHandle, CgiDescriptorHeapType, CgiDescriptorSetDef, CgiError, CgiResourceId,
    CgiResourceState, CgiResult, CgiSetSampler, CgiShaderBranch, CgiShaderDef,
    CgiShaderStageFlags, CgiTextureUsage, CONSTANT_BUFFER_ALIGNMENT,
};
use cgi_base::handle_pool::HandlePool;
use cgi_base::ring::PerRingSlot;
use fnv::FnvHashMap;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug)]
pub struct CgiCompiledStage {
    pub stage: CgiShaderStageFlags,
    pub entry: String,
    pub code: String,
}

/// Preprocessed code of every stage of one branch
#[derive(Clone, Debug)]
pub struct CgiCompiledBranch {
    pub branch: CgiShaderBranch,
    pub stages: Vec<CgiCompiledStage>,
}

impl CgiCompiledBranch {
    pub fn stage(
        &self,
        stage: CgiShaderStageFlags,
    ) -> Option<&CgiCompiledStage> {
        self.stages.iter().find(|compiled| compiled.stage == stage)
    }
}

// Live complex set. Its descriptors sit at `index * slot_count` in the set's CPU heaps.
struct ComplexSet {
    _textures: Vec<CgiTextureHeadless>,
}

struct DescriptorSet {
    set_def: CgiDescriptorSetDef,
    aligned_uniform_size: u64,
    root_constants: bool,
    // Upload memory, `capacity` instances per ring slot
    constant_buffer: Option<CgiResourceId>,
    // CPU-only CBVs, one per (ring slot, instance)
    cbv_heap: Option<CgiDescriptorHeap>,
    // Uniform data staged by write_uniform for the next bind
    scratch: PerRingSlot<Vec<u8>>,
    next_instance: u32,
    last_reset_frame: u64,

    srv_heap: Option<CgiDescriptorHeap>,
    sampler_heap: Option<CgiDescriptorHeap>,
    // Texture slots whose sampler comes from the bound texture
    custom_sampler_slots: Vec<u32>,
    complex_sets: HandlePool<ComplexSet>,
}

impl DescriptorSet {
    fn new(
        device_context: &CgiDeviceContextHeadless,
        source_name: &str,
        set_def: &CgiDescriptorSetDef,
    ) -> Self {
        let ring_buffer_size = device_context.ring_buffer_size();
        let capacity = set_def.capacity;
        let aligned_uniform_size =
            cgi_base::memory::align_up(set_def.uniform_size as u64, CONSTANT_BUFFER_ALIGNMENT);
        let root_constants = try_root_constants(set_def);

        let mut constant_buffer = None;
        let mut cbv_heap = None;
        if set_def.uniform_size > 0 && !root_constants {
            let view_count = capacity * ring_buffer_size;
            let resource = device_context.gpu().create_buffer(
                &format!("{} set {} constants", source_name, set_def.set_number),
                aligned_uniform_size * view_count as u64,
                CgiResourceState::GENERIC_READ,
            );

            let heap = CgiDescriptorHeap::new(CgiDescriptorHeapType::CbvSrvUav, view_count, false);
            for view_index in 0..view_count {
                heap.write(
                    view_index,
                    CgiDescriptor::Cbv {
                        address: CgiGpuAddress {
                            resource,
                            offset: view_index as u64 * aligned_uniform_size,
                        },
                        size: aligned_uniform_size as u32,
                    },
                );
            }

            constant_buffer = Some(resource);
            cbv_heap = Some(heap);
        }

        let texture_count = set_def.texture_count();
        let srv_heap = if texture_count > 0 {
            Some(CgiDescriptorHeap::new(
                CgiDescriptorHeapType::CbvSrvUav,
                capacity * texture_count,
                false,
            ))
        } else {
            None
        };

        let custom_sampler_slots: Vec<u32> = set_def
            .samplers
            .iter()
            .enumerate()
            .filter(|(_, sampler)| **sampler == CgiSetSampler::Custom)
            .map(|(slot, _)| slot as u32)
            .collect();
        let sampler_heap = if !custom_sampler_slots.is_empty() {
            Some(CgiDescriptorHeap::new(
                CgiDescriptorHeapType::Sampler,
                capacity * custom_sampler_slots.len() as u32,
                false,
            ))
        } else {
            None
        };

        let uniform_size = set_def.uniform_size as usize;
        DescriptorSet {
            set_def: set_def.clone(),
            aligned_uniform_size,
            root_constants,
            constant_buffer,
            cbv_heap,
            scratch: PerRingSlot::new_with(ring_buffer_size, |_| vec![0; uniform_size]),
            next_instance: 0,
            last_reset_frame: 0,
            srv_heap,
            sampler_heap,
            custom_sampler_slots,
            complex_sets: HandlePool::with_max_len(capacity as usize),
        }
    }
}

struct ShaderState {
    descriptor_sets: BTreeMap<u32, DescriptorSet>,
    root_signature: Option<Arc<CgiRootSignatureHeadless>>,
    binding_descriptors: bool,
}

pub struct CgiShaderHeadlessInner {
    device_context: CgiDeviceContextHeadless,
    source_name: String,
    branches: Vec<CgiCompiledBranch>,
    branch_lookup: FnvHashMap<String, usize>,
    state: Mutex<ShaderState>,
}

impl Drop for CgiShaderHeadlessInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(|e| e.into_inner());
        for descriptor_set in state.descriptor_sets.values() {
            if let Some(constant_buffer) = descriptor_set.constant_buffer {
                self.device_context.gpu().destroy_resource(constant_buffer);
            }
        }
    }
}

impl CgiFrameListener for CgiShaderHeadlessInner {
    fn on_begin_frame(
        &self,
        frame_info: &CgiFrameInfo,
    ) {
        let mut state = self.state.lock().unwrap();
        for descriptor_set in state.descriptor_sets.values_mut() {
            if descriptor_set.last_reset_frame != frame_info.frame_count {
                descriptor_set.last_reset_frame = frame_info.frame_count;
                descriptor_set.next_instance = 0;
            }
        }
    }
}

/// Report a compile diagnostic
fn on_error(
    source_name: &str,
    message: &str,
) -> CgiError {
    log::error!("{}: {}", source_name, message);
    CgiError::ShaderCompileError(format!("{}: {}", source_name, message))
}

fn compile_branch(
    shader_def: &CgiShaderDef,
    branch: &CgiShaderBranch,
) -> CgiResult<CgiCompiledBranch> {
    profiling::scope!("compile shader branch");
    let mut stages = Vec::default();
    for stage in branch.stages.stages() {
        // stages() only yields single stages, which all have a suffix
        let suffix = stage.entry_suffix().unwrap_or_default();
        let entry = format!("{}{}", branch.entry, suffix);

        let mut preprocessor = Preprocessor::new(&shader_def.source_name);
        preprocessor.define(&format!("_{}", suffix), "1");
        for shader_macro in &branch.macros {
            preprocessor.define(&shader_macro.name, &shader_macro.value);
        }

        let code = preprocessor
            .process(&shader_def.source)
            .map_err(|message| {
                on_error(
                    &shader_def.source_name,
                    &format!("branch {}: {}", branch.name, message),
                )
            })?;

        if !has_entry_point(&code, &entry) {
            return Err(on_error(
                &shader_def.source_name,
                &format!("branch {}: entry point {} not found", branch.name, entry),
            ));
        }

        stages.push(CgiCompiledStage { stage, entry, code });
    }

    Ok(CgiCompiledBranch {
        branch: branch.clone(),
        stages,
    })
}

/// A shader source compiled once per branch, with its descriptor sets and root signature.
///
/// Set up in three steps: `new` compiles the branches, `create_descriptor_set` declares each set,
/// `create_pipeline_layout` builds the root signature. No set may be added after that.
#[derive(Clone)]
pub struct CgiShaderHeadless {
    inner: Arc<CgiShaderHeadlessInner>,
}

impl std::fmt::Debug for CgiShaderHeadless {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CgiShaderHeadless")
            .field("source_name", &self.inner.source_name)
            .field("branch_count", &self.inner.branches.len())
            .finish()
    }
}

impl CgiShaderHeadless {
    pub fn new(
        device_context: &CgiDeviceContextHeadless,
        shader_def: &CgiShaderDef,
    ) -> CgiResult<Self> {
        let mut branches: Vec<CgiCompiledBranch> = Vec::default();
        let mut branch_lookup = FnvHashMap::default();

        for branch_desc in &shader_def.branches {
            let branch = CgiShaderBranch::parse(branch_desc)
                .map_err(|e| on_error(&shader_def.source_name, &e.to_string()))?;

            if let Some(&existing) = branch_lookup.get(&branch.name) {
                let existing: &CgiCompiledBranch = &branches[existing];
                if existing.branch == branch {
                    continue;
                }
                return Err(on_error(
                    &shader_def.source_name,
                    &format!(
                        "branch name {} is declared twice with different descriptors",
                        branch.name
                    ),
                ));
            }

            let compiled = compile_branch(shader_def, &branch)?;
            branch_lookup.insert(branch.name.clone(), branches.len());
            branches.push(compiled);
        }

        if let Some(dump_dir) = device_context.save_compiled_shaders_dir() {
            Self::save_compiled(dump_dir, &shader_def.source_name, &branches)?;
        }

        log::debug!(
            "Compiled shader {} with {} branches",
            shader_def.source_name,
            branches.len()
        );

        let inner = Arc::new(CgiShaderHeadlessInner {
            device_context: device_context.clone(),
            source_name: shader_def.source_name.clone(),
            branches,
            branch_lookup,
            state: Mutex::new(ShaderState {
                descriptor_sets: BTreeMap::default(),
                root_signature: None,
                binding_descriptors: false,
            }),
        });

        let listener: Arc<dyn CgiFrameListener> = inner.clone();
        device_context.register_frame_listener(&listener);

        Ok(CgiShaderHeadless { inner })
    }

    fn save_compiled(
        dump_dir: &std::path::Path,
        source_name: &str,
        branches: &[CgiCompiledBranch],
    ) -> CgiResult<()> {
        std::fs::create_dir_all(dump_dir)?;
        let stem = std::path::Path::new(source_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(source_name);
        for branch in branches {
            for stage in &branch.stages {
                let file_name = format!("{}.{}.{}.txt", stem, branch.branch.name, stage.entry);
                std::fs::write(dump_dir.join(&file_name), &stage.code)?;
                log::trace!("Saved compiled stage {}", file_name);
            }
        }
        Ok(())
    }

    pub fn source_name(&self) -> &str {
        &self.inner.source_name
    }

    pub fn branches(&self) -> &[CgiCompiledBranch] {
        &self.inner.branches
    }

    pub fn has_branch(
        &self,
        branch_name: &str,
    ) -> bool {
        self.inner.branch_lookup.contains_key(branch_name)
    }

    pub fn branch(
        &self,
        branch_name: &str,
    ) -> Option<&CgiCompiledBranch> {
        self.inner
            .branch_lookup
            .get(branch_name)
            .map(|&index| &self.inner.branches[index])
    }

    /// Code of one stage of a branch
    pub fn compiled_code(
        &self,
        branch_name: &str,
        stage: CgiShaderStageFlags,
    ) -> Option<&str> {
        self.branch(branch_name)?
            .stage(stage)
            .map(|compiled| compiled.code.as_str())
    }

    pub fn create_descriptor_set(
        &self,
        set_def: &CgiDescriptorSetDef,
    ) -> CgiResult<()> {
        let mut state = self.inner.state.lock().unwrap();
        if state.root_signature.is_some() {
            return Err(format!(
                "shader {}: descriptor set {} declared after create_pipeline_layout",
                self.inner.source_name, set_def.set_number
            )
            .into());
        }
        if state.descriptor_sets.contains_key(&set_def.set_number) {
            return Err(format!(
                "shader {}: descriptor set {} declared twice",
                self.inner.source_name, set_def.set_number
            )
            .into());
        }
        if set_def.capacity == 0 {
            return Err(format!(
                "shader {}: descriptor set {} has zero capacity",
                self.inner.source_name, set_def.set_number
            )
            .into());
        }

        let descriptor_set =
            DescriptorSet::new(&self.inner.device_context, &self.inner.source_name, set_def);
        log::trace!(
            "Shader {}: set {} with {} bytes of uniforms (aligned {}), capacity {}, {} textures",
            self.inner.source_name,
            set_def.set_number,
            set_def.uniform_size,
            descriptor_set.aligned_uniform_size,
            set_def.capacity,
            set_def.texture_count()
        );
        state
            .descriptor_sets
            .insert(set_def.set_number, descriptor_set);
        Ok(())
    }

    /// Build the root signature from the declared sets
    pub fn create_pipeline_layout(&self) -> CgiResult<()> {
        let mut state = self.inner.state.lock().unwrap();
        if state.root_signature.is_some() {
            return Err(format!(
                "shader {}: create_pipeline_layout called twice",
                self.inner.source_name
            )
            .into());
        }

        let set_defs: Vec<&CgiDescriptorSetDef> = state
            .descriptor_sets
            .values()
            .map(|descriptor_set| &descriptor_set.set_def)
            .collect();
        let root_signature =
            CgiRootSignatureHeadless::new(self.inner.device_context.next_object_id(), &set_defs)?;
        state.root_signature = Some(Arc::new(root_signature));
        Ok(())
    }

    pub fn root_signature(&self) -> Option<Arc<CgiRootSignatureHeadless>> {
        self.inner.state.lock().unwrap().root_signature.clone()
    }

    pub fn descriptor_set_def(
        &self,
        set_number: u32,
    ) -> Option<CgiDescriptorSetDef> {
        self.inner
            .state
            .lock()
            .unwrap()
            .descriptor_sets
            .get(&set_number)
            .map(|descriptor_set| descriptor_set.set_def.clone())
    }

    /// Open a batch of uniform updates
    pub fn begin_bind_descriptors(&self) {
        let mut state = self.inner.state.lock().unwrap();
        assert!(
            !state.binding_descriptors,
            "shader {}: begin_bind_descriptors called twice",
            self.inner.source_name
        );
        state.binding_descriptors = true;
    }

    pub fn end_bind_descriptors(&self) {
        let mut state = self.inner.state.lock().unwrap();
        assert!(
            state.binding_descriptors,
            "shader {}: end_bind_descriptors without begin_bind_descriptors",
            self.inner.source_name
        );
        state.binding_descriptors = false;
    }

    /// Stage uniform data of a set for the next `cmd_bind_descriptors`. Must be called between
    /// `begin_bind_descriptors` and `end_bind_descriptors`.
    pub fn write_uniform_bytes(
        &self,
        set_number: u32,
        data: &[u8],
    ) -> CgiResult<()> {
        let ring_index = self.inner.device_context.ring_index();
        let mut state = self.inner.state.lock().unwrap();
        assert!(
            state.binding_descriptors,
            "shader {}: uniforms written outside begin_bind_descriptors/end_bind_descriptors",
            self.inner.source_name
        );

        let source_name = &self.inner.source_name;
        let descriptor_set = state
            .descriptor_sets
            .get_mut(&set_number)
            .ok_or_else(|| format!("shader {} has no descriptor set {}", source_name, set_number))?;
        if data.len() > descriptor_set.set_def.uniform_size as usize {
            return Err(format!(
                "shader {}: {} bytes written to set {} which holds {} bytes of uniforms",
                source_name,
                data.len(),
                set_number,
                descriptor_set.set_def.uniform_size
            )
            .into());
        }

        descriptor_set.scratch[ring_index][..data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn write_uniform<T: bytemuck::Pod>(
        &self,
        set_number: u32,
        data: &T,
    ) -> CgiResult<()> {
        self.write_uniform_bytes(set_number, bytemuck::bytes_of(data))
    }

    /// Allocate a complex set holding one texture per slot of the set. `first_mips` optionally
    /// selects the most detailed mip each view starts at. Running out of complex sets is fatal.
    pub fn bind_descriptor_set_textures(
        &self,
        set_number: u32,
        textures: &[&CgiTextureHeadless],
        first_mips: Option<&[u32]>,
    ) -> CgiResult<CgiComplexSetHandle> {
        let mut state = self.inner.state.lock().unwrap();
        let source_name = &self.inner.source_name;
        let descriptor_set = state
            .descriptor_sets
            .get_mut(&set_number)
            .ok_or_else(|| format!("shader {} has no descriptor set {}", source_name, set_number))?;

        let set_def = &descriptor_set.set_def;
        let texture_count = set_def.texture_count();
        if textures.len() != texture_count as usize {
            return Err(format!(
                "shader {}: set {} has {} texture slots, {} textures given",
                source_name,
                set_number,
                texture_count,
                textures.len()
            )
            .into());
        }
        if let Some(first_mips) = first_mips {
            if first_mips.len() != textures.len() {
                return Err("bind_descriptor_set_textures needs one first mip per texture".into());
            }
        }

        let mut views = Vec::with_capacity(textures.len());
        for (slot, (texture, sampler)) in textures.iter().zip(&set_def.samplers).enumerate() {
            let texture_def = texture.texture_def();
            let view = if *sampler == CgiSetSampler::Storage {
                if !texture_def.usage.contains(CgiTextureUsage::UNORDERED_ACCESS) {
                    return Err(format!(
                        "texture {} bound to storage slot {} lacks UNORDERED_ACCESS usage",
                        texture_def.name, slot
                    )
                    .into());
                }
                CgiDescriptor::Uav {
                    resource: texture.resource(),
                    mip_level: first_mips.map(|mips| mips[slot]).unwrap_or(0),
                }
            } else {
                if texture.srv_index().is_none() {
                    return Err(format!(
                        "texture {} bound to slot {} of set {} is not sampled",
                        texture_def.name, slot, set_number
                    )
                    .into());
                }
                let first_mip = first_mips.map(|mips| mips[slot]).unwrap_or(0);
                if first_mip >= texture_def.mip_count {
                    return Err(format!(
                        "texture {} has no mip {}",
                        texture_def.name, first_mip
                    )
                    .into());
                }
                CgiDescriptor::Srv {
                    resource: texture.resource(),
                    format: texture_def.format,
                    first_mip,
                    mip_count: texture_def.mip_count - first_mip,
                    cube: texture_def.usage.contains(CgiTextureUsage::CUBE_MAP),
                }
            };
            views.push(view);
        }

        let handle = descriptor_set.complex_sets.insert(ComplexSet {
            _textures: textures.iter().map(|texture| (*texture).clone()).collect(),
        });

        if let Some(srv_heap) = &descriptor_set.srv_heap {
            let first = handle.index() * texture_count;
            for (slot, view) in views.into_iter().enumerate() {
                srv_heap.write(first + slot as u32, view);
            }
        }
        if let Some(sampler_heap) = &descriptor_set.sampler_heap {
            let first = handle.index() * descriptor_set.custom_sampler_slots.len() as u32;
            for (i, slot) in descriptor_set.custom_sampler_slots.iter().enumerate() {
                let sampler = textures[*slot as usize]
                    .texture_def()
                    .sampler
                    .unwrap_or_default();
                sampler_heap.write(first + i as u32, CgiDescriptor::Sampler(sampler));
            }
        }

        Ok(CgiComplexSetHandle { set_number, handle })
    }

    /// Release a complex set. Panics if the handle is stale.
    pub fn free_descriptor_set(
        &self,
        complex_set: CgiComplexSetHandle,
    ) {
        let mut state = self.inner.state.lock().unwrap();
        let descriptor_set = state
            .descriptor_sets
            .get_mut(&complex_set.set_number)
            .unwrap_or_else(|| {
                panic!(
                    "shader {} has no descriptor set {}",
                    self.inner.source_name, complex_set.set_number
                )
            });
        descriptor_set.complex_sets.remove(complex_set.handle);
    }

    /// Number of live complex sets of a set
    pub fn complex_set_count(
        &self,
        set_number: u32,
    ) -> usize {
        self.inner
            .state
            .lock()
            .unwrap()
            .descriptor_sets
            .get(&set_number)
            .map(|descriptor_set| descriptor_set.complex_sets.len())
            .unwrap_or(0)
    }

    /// Instances of the set's constant buffer used in the current frame
    pub fn constant_buffer_load(
        &self,
        set_number: u32,
    ) -> u32 {
        self.inner
            .state
            .lock()
            .unwrap()
            .descriptor_sets
            .get(&set_number)
            .map(|descriptor_set| descriptor_set.next_instance)
            .unwrap_or(0)
    }

    // Native commands that bind one set: the staged uniforms are copied into the next constant
    // buffer instance and the complex set's descriptors into the dynamic heaps.
    pub(crate) fn bind_commands(
        &self,
        bind_point: CgiPipelineBindPoint,
        set_number: u32,
        complex_set: Option<CgiComplexSetHandle>,
    ) -> CgiResult<Vec<CgiNativeCommand>> {
        let device_context = &self.inner.device_context;
        let ring_index = device_context.ring_index();
        let source_name = &self.inner.source_name;

        let mut state = self.inner.state.lock().unwrap();
        let root_signature = state.root_signature.clone().ok_or_else(|| {
            format!(
                "shader {}: create_pipeline_layout must be called before binding descriptors",
                source_name
            )
        })?;
        let parameters = *root_signature
            .set_parameters(set_number)
            .ok_or_else(|| format!("shader {} has no descriptor set {}", source_name, set_number))?;
        let descriptor_set = state
            .descriptor_sets
            .get_mut(&set_number)
            .ok_or_else(|| format!("shader {} has no descriptor set {}", source_name, set_number))?;

        let mut commands = Vec::default();

        if let Some(parameter_index) = parameters.constants {
            let values = descriptor_set.scratch[ring_index]
                .chunks(4)
                .map(|chunk| {
                    let mut bytes = [0u8; 4];
                    bytes[..chunk.len()].copy_from_slice(chunk);
                    u32::from_le_bytes(bytes)
                })
                .collect();
            commands.push(CgiNativeCommand::SetRoot32BitConstants {
                bind_point,
                parameter_index,
                values,
            });
        }

        if let Some(parameter_index) = parameters.constant_buffer_view {
            let capacity = descriptor_set.set_def.capacity;
            let instance = descriptor_set.next_instance;
            assert!(
                instance < capacity,
                "shader {}: set {} was bound more than its capacity of {} times this frame",
                source_name,
                set_number,
                capacity
            );
            descriptor_set.next_instance += 1;

            let view_index = ring_index * capacity + instance;
            let address = match descriptor_set
                .cbv_heap
                .as_ref()
                .and_then(|heap| heap.read(view_index))
            {
                Some(CgiDescriptor::Cbv { address, .. }) => address,
                other => {
                    return Err(format!(
                        "shader {}: set {} has no constant buffer view {} ({:?})",
                        source_name, set_number, view_index, other
                    )
                    .into())
                }
            };
            device_context.gpu().write_buffer(
                address.resource,
                address.offset,
                &descriptor_set.scratch[ring_index],
            );
            commands.push(CgiNativeCommand::SetRootConstantBufferView {
                bind_point,
                parameter_index,
                address,
            });
        }

        if parameters.srv_table.is_some() || parameters.sampler_table.is_some() {
            let complex_set = complex_set.ok_or_else(|| {
                format!(
                    "shader {}: set {} has textures and needs a complex set",
                    source_name, set_number
                )
            })?;
            if complex_set.set_number != set_number
                || !descriptor_set.complex_sets.contains(complex_set.handle)
            {
                return Err(format!(
                    "shader {}: stale complex set {:?} bound to set {}",
                    source_name, complex_set, set_number
                )
                .into());
            }

            if let (Some(parameter_index), Some(srv_heap)) =
                (parameters.srv_table, &descriptor_set.srv_heap)
            {
                let count = descriptor_set.set_def.texture_count();
                let (first, handles) =
                    device_context.cbv_srv_uav_heap().get_next_handle_pair(count);
                CgiDescriptorHeap::copy_descriptors(
                    device_context.cbv_srv_uav_heap().heap(),
                    first,
                    srv_heap,
                    complex_set.handle.index() * count,
                    count,
                );
                commands.push(CgiNativeCommand::SetRootDescriptorTable {
                    bind_point,
                    parameter_index,
                    base: handles.gpu,
                });
            }

            if let (Some(parameter_index), Some(sampler_heap)) =
                (parameters.sampler_table, &descriptor_set.sampler_heap)
            {
                let count = descriptor_set.custom_sampler_slots.len() as u32;
                let (first, handles) = device_context.sampler_heap().get_next_handle_pair(count);
                CgiDescriptorHeap::copy_descriptors(
                    device_context.sampler_heap().heap(),
                    first,
                    sampler_heap,
                    complex_set.handle.index() * count,
                    count,
                );
                commands.push(CgiNativeCommand::SetRootDescriptorTable {
                    bind_point,
                    parameter_index,
                    base: handles.gpu,
                });
            }
        }

        Ok(commands)
    }

    /// Root constant values of the set, for `cmd_push_constants`
    pub(crate) fn root_constants_parameter(
        &self,
        set_number: u32,
    ) -> Option<u32> {
        let state = self.inner.state.lock().unwrap();
        let root_signature = state.root_signature.as_ref()?;
        let descriptor_set = state.descriptor_sets.get(&set_number)?;
        if !descriptor_set.root_constants {
            return None;
        }
        root_signature.set_parameters(set_number)?.constants
    }
}
