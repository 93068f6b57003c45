use crate::{
    CgiDescriptorSetDef, CgiResult, CgiSamplerDef, CgiSetSampler, CgiShaderStageFlags,
    MAX_ROOT_CONSTANTS_SIZE, MAX_ROOT_SIGNATURE_DWORDS,
};
use fnv::FnvHashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CgiRootParameter {
    /// Uniform data inlined in the root signature
    Constants { set_number: u32, num_values: u32 },
    /// Root constant buffer view, bound by GPU address
    ConstantBufferView { set_number: u32 },
    SrvTable { set_number: u32, count: u32 },
    SamplerTable { set_number: u32, count: u32 },
}

impl CgiRootParameter {
    /// Cost of the parameter in the root signature, as in D3D12
    pub fn dword_cost(&self) -> u32 {
        match self {
            CgiRootParameter::Constants { num_values, .. } => *num_values,
            CgiRootParameter::ConstantBufferView { .. } => 2,
            CgiRootParameter::SrvTable { .. } | CgiRootParameter::SamplerTable { .. } => 1,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CgiStaticSampler {
    pub shader_register: u32,
    pub register_space: u32,
    pub sampler: CgiSamplerDef,
    pub visibility: CgiShaderStageFlags,
}

/// Root parameter indices of one descriptor set
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CgiSetRootParameters {
    pub constants: Option<u32>,
    pub constant_buffer_view: Option<u32>,
    pub srv_table: Option<u32>,
    pub sampler_table: Option<u32>,
}

/// True if the set's uniform block is small enough to be passed as root constants
pub fn try_root_constants(set_def: &CgiDescriptorSetDef) -> bool {
    set_def.set_number == 0
        && set_def.uniform_size > 0
        && set_def.uniform_size <= MAX_ROOT_CONSTANTS_SIZE
        && set_def.samplers.is_empty()
}

#[derive(Debug)]
pub struct CgiRootSignatureHeadless {
    id: u64,
    parameters: Vec<CgiRootParameter>,
    static_samplers: Vec<CgiStaticSampler>,
    set_parameters: FnvHashMap<u32, CgiSetRootParameters>,
}

impl CgiRootSignatureHeadless {
    /// Build the root signature for the given sets, which are laid out in set number order
    pub fn new(
        id: u64,
        set_defs: &[&CgiDescriptorSetDef],
    ) -> CgiResult<Self> {
        let mut set_defs = set_defs.to_vec();
        set_defs.sort_by_key(|set_def| set_def.set_number);

        let mut parameters = Vec::default();
        let mut static_samplers = Vec::default();
        let mut set_parameters = FnvHashMap::default();

        for set_def in set_defs {
            let set_number = set_def.set_number;
            let mut indices = CgiSetRootParameters::default();

            if try_root_constants(set_def) {
                indices.constants = Some(parameters.len() as u32);
                parameters.push(CgiRootParameter::Constants {
                    set_number,
                    num_values: cgi_base::memory::div_round_up(set_def.uniform_size, 4),
                });
            } else if set_def.uniform_size > 0 {
                indices.constant_buffer_view = Some(parameters.len() as u32);
                parameters.push(CgiRootParameter::ConstantBufferView { set_number });
            }

            if set_def.texture_count() > 0 {
                indices.srv_table = Some(parameters.len() as u32);
                parameters.push(CgiRootParameter::SrvTable {
                    set_number,
                    count: set_def.texture_count(),
                });
            }

            let custom_sampler_count = set_def
                .samplers
                .iter()
                .filter(|sampler| **sampler == CgiSetSampler::Custom)
                .count() as u32;
            if custom_sampler_count > 0 {
                indices.sampler_table = Some(parameters.len() as u32);
                parameters.push(CgiRootParameter::SamplerTable {
                    set_number,
                    count: custom_sampler_count,
                });
            }

            for (slot, sampler) in set_def.samplers.iter().enumerate() {
                if let CgiSetSampler::Static(sampler) = sampler {
                    static_samplers.push(CgiStaticSampler {
                        shader_register: slot as u32,
                        register_space: set_number,
                        sampler: *sampler,
                        visibility: set_def.stage_flags,
                    });
                }
            }

            set_parameters.insert(set_number, indices);
        }

        let dword_count: u32 = parameters.iter().map(|p| p.dword_cost()).sum();
        if dword_count > MAX_ROOT_SIGNATURE_DWORDS {
            return Err(format!(
                "root signature needs {} DWORDs, the limit is {}",
                dword_count, MAX_ROOT_SIGNATURE_DWORDS
            )
            .into());
        }

        log::trace!(
            "Root signature {}: {} parameters, {} static samplers, {} DWORDs",
            id,
            parameters.len(),
            static_samplers.len(),
            dword_count
        );

        Ok(CgiRootSignatureHeadless {
            id,
            parameters,
            static_samplers,
            set_parameters,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn parameters(&self) -> &[CgiRootParameter] {
        &self.parameters
    }

    pub fn static_samplers(&self) -> &[CgiStaticSampler] {
        &self.static_samplers
    }

    pub fn dword_count(&self) -> u32 {
        self.parameters.iter().map(|p| p.dword_cost()).sum()
    }

    pub fn set_parameters(
        &self,
        set_number: u32,
    ) -> Option<&CgiSetRootParameters> {
        self.set_parameters.get(&set_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_set_zero_becomes_root_constants() {
        let per_draw = CgiDescriptorSetDef::new(0, 48, 16, CgiShaderStageFlags::VS_FS);
        let material = CgiDescriptorSetDef::new(1, 256, 16, CgiShaderStageFlags::FRAGMENT)
            .with_samplers(vec![
                CgiSetSampler::Custom,
                CgiSetSampler::Static(CgiSamplerDef::linear_clamp()),
                CgiSetSampler::Custom,
            ]);

        // Given out of order on purpose
        let root_signature =
            CgiRootSignatureHeadless::new(1, &[&material, &per_draw]).unwrap();

        assert_eq!(
            root_signature.parameters(),
            &[
                CgiRootParameter::Constants {
                    set_number: 0,
                    num_values: 12
                },
                CgiRootParameter::ConstantBufferView { set_number: 1 },
                CgiRootParameter::SrvTable {
                    set_number: 1,
                    count: 3
                },
                CgiRootParameter::SamplerTable {
                    set_number: 1,
                    count: 2
                },
            ]
        );
        assert_eq!(root_signature.dword_count(), 12 + 2 + 1 + 1);
        assert_eq!(root_signature.static_samplers().len(), 1);
        assert_eq!(root_signature.static_samplers()[0].shader_register, 1);
        assert_eq!(root_signature.static_samplers()[0].register_space, 1);

        let material_parameters = root_signature.set_parameters(1).unwrap();
        assert_eq!(material_parameters.constant_buffer_view, Some(1));
        assert_eq!(material_parameters.sampler_table, Some(3));
    }

    #[test]
    fn large_or_textured_sets_use_constant_buffers() {
        let large = CgiDescriptorSetDef::new(0, 80, 4, CgiShaderStageFlags::VERTEX);
        let root_signature =
            CgiRootSignatureHeadless::new(1, &[&large]).unwrap();
        assert_eq!(
            root_signature.parameters(),
            &[CgiRootParameter::ConstantBufferView { set_number: 0 }]
        );

        let textured = CgiDescriptorSetDef::new(0, 16, 4, CgiShaderStageFlags::FRAGMENT)
            .with_samplers(vec![CgiSetSampler::Input]);
        assert!(!try_root_constants(&textured));
    }

    #[test]
    fn dword_budget_is_enforced() {
        let sets: Vec<CgiDescriptorSetDef> = (0..33)
            .map(|set_number| {
                CgiDescriptorSetDef::new(set_number, 256, 1, CgiShaderStageFlags::ALL)
            })
            .collect();
        let set_refs: Vec<&CgiDescriptorSetDef> = sets.iter().collect();
        assert!(CgiRootSignatureHeadless::new(1, &set_refs).is_err());
        assert!(
            CgiRootSignatureHeadless::new(1, &set_refs[..32]).is_ok()
        );
    }
}
