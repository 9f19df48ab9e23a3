//! 末端位姿
//!
//! 控制器以 `[x, y, z, rx, ry, rz]` 表示末端位姿：前 3 个分量为位置（米），
//! 后 3 个分量为旋转向量（轴角 / Rodrigues 形式，模长为旋转角，单位弧度）。

use nalgebra::{Isometry3, Rotation3, Translation3, UnitQuaternion, Vector3};

/// 笛卡尔位姿（位置 + 旋转向量）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CartesianPose {
    /// 位置 [x, y, z]（米）
    pub position: [f64; 3],
    /// 旋转向量 [rx, ry, rz]（弧度）
    pub rotation_vector: [f64; 3],
}

impl CartesianPose {
    /// 创建新的位姿
    pub const fn new(position: [f64; 3], rotation_vector: [f64; 3]) -> Self {
        Self {
            position,
            rotation_vector,
        }
    }

    /// 从控制器的 6 维工具向量构造
    pub fn from_tool_vector(v: [f64; 6]) -> Self {
        Self::new([v[0], v[1], v[2]], [v[3], v[4], v[5]])
    }

    /// 转换为 6 维工具向量
    pub fn to_tool_vector(&self) -> [f64; 6] {
        let [x, y, z] = self.position;
        let [rx, ry, rz] = self.rotation_vector;
        [x, y, z, rx, ry, rz]
    }

    /// 旋转矩阵（Rodrigues 公式）
    ///
    /// 从世界坐标系到末端坐标系。
    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(Vector3::from(self.rotation_vector))
    }

    /// 组合为完整 6 自由度刚体变换
    pub fn to_isometry(&self) -> Isometry3<f64> {
        let rotation = UnitQuaternion::from_rotation_matrix(&self.rotation());
        Isometry3::from_parts(Translation3::from(Vector3::from(self.position)), rotation)
    }

    /// 从刚体变换构造（旋转部分转换为旋转向量）
    pub fn from_isometry(frame: &Isometry3<f64>) -> Self {
        let t = frame.translation.vector;
        let r = frame.rotation.scaled_axis();
        Self::new([t.x, t.y, t.z], [r.x, r.y, r.z])
    }
}
