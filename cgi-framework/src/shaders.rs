// Shader sources of the deferred pipeline. Every shader draws a fullscreen triangle generated
// from SV_VertexID, so none of them needs a vertex buffer.

pub const LIGHTING_SHADER_NAME: &str = "deferred_lighting.hlsl";

pub const LIGHTING_SHADER: &str = r#"
//@ directional
//@ omni

struct LightConstants
{
    float4 position_or_direction;
    float4 color_intensity;
};
ConstantBuffer<LightConstants> light : register(b0, space0);

cbuffer ViewConstants : register(b0, space1)
{
    float4x4 inv_view_proj;
    float4 eye_position;
};
SubpassInput<float4> gbuffer_albedo : register(t0, space1);
SubpassInput<float4> gbuffer_normal : register(t1, space1);
SubpassInput<float4> gbuffer_material : register(t2, space1);
SubpassInput<float> gbuffer_depth : register(t3, space1);

struct LightOutput
{
    float4 diffuse : SV_Target0;
    float4 specular : SV_Target1;
};

float3 world_position(float4 position)
{
    float4 clip = float4(position.xy, gbuffer_depth.SubpassLoad(), 1.0);
    float4 world = mul(inv_view_proj, clip);
    return world.xyz / world.w;
}

#ifdef _VS
float4 directionalVS(uint id : SV_VertexID) : SV_Position
{
    float2 uv = float2((id << 1) & 2, id & 2);
    return float4(uv * 2.0 - 1.0, 0.0, 1.0);
}

float4 omniVS(uint id : SV_VertexID) : SV_Position
{
    float2 uv = float2((id << 1) & 2, id & 2);
    return float4(uv * 2.0 - 1.0, 0.0, 1.0);
}
#endif

#ifdef _FS
LightOutput directionalFS(float4 position : SV_Position)
{
    float3 n = normalize(gbuffer_normal.SubpassLoad().xyz * 2.0 - 1.0);
    float3 l = -light.position_or_direction.xyz;
    float3 v = normalize(eye_position.xyz - world_position(position));
    float ndotl = saturate(dot(n, l));
    float spec = pow(saturate(dot(n, normalize(l + v))), gbuffer_material.SubpassLoad().r * 255.0);

    LightOutput output;
    output.diffuse = float4(light.color_intensity.rgb * light.color_intensity.a * ndotl, 1.0);
    output.specular = float4(light.color_intensity.rgb * spec * ndotl, 1.0);
    return output;
}

LightOutput omniFS(float4 position : SV_Position)
{
    float3 p = world_position(position);
    float3 to_light = light.position_or_direction.xyz - p;
    float attenuation = saturate(1.0 - length(to_light) / light.position_or_direction.w);
    float3 n = normalize(gbuffer_normal.SubpassLoad().xyz * 2.0 - 1.0);
    float ndotl = saturate(dot(n, normalize(to_light)));

    LightOutput output;
    output.diffuse = float4(light.color_intensity.rgb * light.color_intensity.a * ndotl * attenuation, 1.0);
    output.specular = float4(0.0, 0.0, 0.0, 1.0);
    return output;
}
#endif
"#;

pub const COMPOSE_SHADER_NAME: &str = "deferred_compose.hlsl";

pub const COMPOSE_SHADER: &str = r#"
//@ compose

Texture2D albedo : register(t0, space0);
Texture2D diffuse_light : register(t1, space0);
Texture2D specular_light : register(t2, space0);
SamplerState point_sampler : register(s0, space0);

#ifdef _VS
float4 composeVS(uint id : SV_VertexID, out float2 uv : TEXCOORD0) : SV_Position
{
    uv = float2((id << 1) & 2, id & 2);
    return float4(uv * float2(2.0, -2.0) + float2(-1.0, 1.0), 0.0, 1.0);
}
#endif

#ifdef _FS
float4 composeFS(float4 position : SV_Position, float2 uv : TEXCOORD0) : SV_Target
{
    float4 base = albedo.Sample(point_sampler, uv);
    float3 lit = base.rgb * diffuse_light.Sample(point_sampler, uv).rgb;
    return float4(lit + specular_light.Sample(point_sampler, uv).rgb, 1.0);
}
#endif
"#;

pub const REFLECTION_SHADER_NAME: &str = "deferred_reflection.hlsl";

pub const REFLECTION_SHADER: &str = r#"
//@ reflect

cbuffer ReflectionConstants : register(b0, space0)
{
    float strength;
    float max_distance;
    float thickness;
    uint max_steps;
};

Texture2D composed : register(t0, space1);
Texture2D normals : register(t1, space1);
Texture2D depth : register(t2, space1);
SamplerState linear_sampler : register(s0, space1);

#ifdef _VS
float4 reflectVS(uint id : SV_VertexID, out float2 uv : TEXCOORD0) : SV_Position
{
    uv = float2((id << 1) & 2, id & 2);
    return float4(uv * float2(2.0, -2.0) + float2(-1.0, 1.0), 0.0, 1.0);
}
#endif

#ifdef _FS
float4 reflectFS(float4 position : SV_Position, float2 uv : TEXCOORD0) : SV_Target
{
    float4 color = composed.Sample(linear_sampler, uv);
    float3 n = normals.Sample(linear_sampler, uv).xyz * 2.0 - 1.0;
    float2 ray = n.xy * max_distance / max_steps;
    float2 p = uv;
    for (uint i = 0; i < max_steps; ++i)
    {
        p += ray;
        if (depth.Sample(linear_sampler, p).r > depth.Sample(linear_sampler, uv).r + thickness)
        {
            return lerp(color, composed.Sample(linear_sampler, p), strength);
        }
    }
    return color;
}
#endif
"#;

pub const PRESENT_SHADER_NAME: &str = "deferred_present.hlsl";

pub const PRESENT_SHADER: &str = r#"
//@ tonemap

cbuffer ToneMapConstants : register(b0, space0)
{
    float exposure;
    float gamma;
    float2 padding;
};

Texture2D source : register(t0, space1);
SamplerState linear_sampler : register(s0, space1);

#ifdef _VS
float4 tonemapVS(uint id : SV_VertexID, out float2 uv : TEXCOORD0) : SV_Position
{
    uv = float2((id << 1) & 2, id & 2);
    return float4(uv * float2(2.0, -2.0) + float2(-1.0, 1.0), 0.0, 1.0);
}
#endif

#ifdef _FS
float4 tonemapFS(float4 position : SV_Position, float2 uv : TEXCOORD0) : SV_Target
{
    float3 hdr = source.Sample(linear_sampler, uv).rgb * exposure;
    float3 mapped = hdr / (hdr + 1.0);
    return float4(pow(mapped, 1.0 / gamma), 1.0);
}
#endif
"#;
