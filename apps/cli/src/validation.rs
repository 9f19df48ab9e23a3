//! 输入验证模块
//!
//! 解析逗号分隔的 6 元数组并做范围检查。

use anyhow::{Context, Result};
use std::f64::consts::PI;
use ur_sdk::CartesianPose;

/// 关节位置验证器
pub struct JointValidator {
    /// 最小角度（弧度）
    min_angle: f64,
    /// 最大角度（弧度）
    max_angle: f64,
}

impl JointValidator {
    /// 创建关节验证器
    ///
    /// # 参数
    /// * `min_angle` - 最小角度（弧度），默认 -2π
    /// * `max_angle` - 最大角度（弧度），默认 2π
    pub fn new(min_angle: Option<f64>, max_angle: Option<f64>) -> Self {
        Self {
            min_angle: min_angle.unwrap_or(-2.0 * PI),
            max_angle: max_angle.unwrap_or(2.0 * PI),
        }
    }

    /// UR 关节的机械范围（±360°）
    pub fn default_range() -> Self {
        Self::new(None, None)
    }

    /// 验证单个关节位置
    pub fn validate_joint(&self, index: usize, position: f64) -> Result<()> {
        if position < self.min_angle || position > self.max_angle {
            anyhow::bail!(
                "关节 J{} 位置 {:.3} rad 超出范围 [{:.3}, {:.3}]",
                index + 1,
                position,
                self.min_angle,
                self.max_angle
            );
        }
        Ok(())
    }

    /// 验证全部 6 个关节位置
    pub fn validate_joints(&self, positions: &[f64; 6]) -> Result<()> {
        for (i, &pos) in positions.iter().enumerate() {
            self.validate_joint(i, pos)?;
        }
        Ok(())
    }
}

/// 解析逗号分隔的 `N` 个有限数值
pub fn parse_values<const N: usize>(text: &str, what: &str) -> Result<[f64; N]> {
    let values: Vec<f64> = text
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("解析{what}失败: {text:?}"))?;

    let values: [f64; N] = values
        .try_into()
        .map_err(|v: Vec<f64>| anyhow::anyhow!("{}需要 {} 个数值，得到 {} 个", what, N, v.len()))?;

    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        anyhow::bail!("{what}第 {} 个数值无效", i + 1);
    }
    Ok(values)
}

/// 解析并验证关节位置
pub fn parse_joints(text: &str) -> Result<[f64; 6]> {
    let joints = parse_values::<6>(text, "关节位置")?;
    JointValidator::default_range().validate_joints(&joints)?;
    Ok(joints)
}

/// 解析末端位姿 `x,y,z,rx,ry,rz`（米 + 旋转向量）
pub fn parse_pose(text: &str) -> Result<CartesianPose> {
    let v = parse_values::<6>(text, "末端位姿")?;
    let rotation = (v[3] * v[3] + v[4] * v[4] + v[5] * v[5]).sqrt();
    if rotation > 2.0 * PI {
        anyhow::bail!("旋转向量模长 {rotation:.3} rad 超过 2π");
    }
    Ok(CartesianPose::from_tool_vector(v))
}

/// 验证持续时间（秒）
pub fn validate_duration(seconds: f64) -> Result<std::time::Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        anyhow::bail!("持续时间必须为正数，得到 {seconds}");
    }
    Ok(std::time::Duration::from_secs_f64(seconds))
}
