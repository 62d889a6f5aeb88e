//! Skeleton metadata used to pick split regions

use hashbrown::HashMap;

use crate::model::{Bone, BoneId};

/// Bones whose parent chain is inverted before splitting: the chest becomes
/// the root of the upper body.
const INVERTED_CHAIN: [&str; 3] = ["sk_chest", "sk_belly", "dsk_hip"];

/// Render-parent table and base-bone priority list for a skeleton.
///
/// Render parents fill in hierarchy that a model's own bone table leaves
/// out, so splitting can still grow regions along the full skeleton.
#[derive(Debug, Clone, Default)]
pub struct SkeletonMetadata {
    render_parents: HashMap<String, Option<String>>,
    base_bones: Vec<String>,
}

impl SkeletonMetadata {
    pub fn new(base_bones: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            render_parents: HashMap::new(),
            base_bones: base_bones.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_render_parent(mut self, bone: &str, parent: Option<&str>) -> Self {
        self.render_parents
            .insert(bone.to_string(), parent.map(str::to_string));
        self
    }

    /// `None` both for unknown bones and for known roots.
    pub fn render_parent(&self, bone: &str) -> Option<&str> {
        self.render_parents.get(bone).and_then(|p| p.as_deref())
    }

    pub fn is_known(&self, bone: &str) -> bool {
        self.render_parents.contains_key(bone)
    }

    /// Bones tried first when choosing where to start a split region
    pub fn base_bones(&self) -> &[String] {
        &self.base_bones
    }

    /// The standard PES character skeleton.
    pub fn pes() -> Self {
        let mut metadata = Self::new(["sk_foot_l", "sk_foot_r", "sk_hand_l", "sk_hand_r", "skf_jaw"])
            .with_render_parent("dsk_hip", None)
            .with_render_parent("sk_belly", Some("dsk_hip"))
            .with_render_parent("sk_chest", Some("sk_belly"))
            .with_render_parent("sk_neck", Some("sk_chest"))
            .with_render_parent("sk_head", Some("sk_neck"))
            .with_render_parent("skf_jaw", Some("sk_head"));
        for side in ["l", "r"] {
            let limb = |name: &str| format!("{name}_{side}");
            for (bone, parent) in [
                (limb("sk_shoulder"), "sk_chest".to_string()),
                (limb("sk_upperarm"), limb("sk_shoulder")),
                (limb("sk_forearm"), limb("sk_upperarm")),
                (limb("sk_hand"), limb("sk_forearm")),
                (limb("sk_thigh"), "dsk_hip".to_string()),
                (limb("sk_leg"), limb("sk_thigh")),
                (limb("sk_foot"), limb("sk_leg")),
                (limb("sk_toe"), limb("sk_foot")),
            ] {
                metadata = metadata.with_render_parent(&bone, Some(&parent));
            }
        }
        metadata
    }

    /// The parent each bone has for splitting purposes.
    ///
    /// A bone's own parent wins. Otherwise its render parent is followed
    /// up to the first bone present in the model. A parent that would close
    /// a loop is dropped. Finally the chest/belly/hip chain is inverted when
    /// the model holds it as a plain chain ending in a root.
    pub fn effective_parents(&self, bones: &[Bone]) -> Vec<Option<BoneId>> {
        let by_name: HashMap<&str, BoneId> = bones
            .iter()
            .enumerate()
            .map(|(i, bone)| (bone.name.as_str(), BoneId(i)))
            .collect();

        let mut parents: Vec<Option<BoneId>> = Vec::with_capacity(bones.len());
        for (index, bone) in bones.iter().enumerate() {
            let parent = match bone.parent {
                Some(parent) if parent.0 < bones.len() => Some(parent),
                _ => self.present_render_ancestor(&bone.name, &by_name),
            };
            let parent = parent.filter(|&p| !closes_loop(BoneId(index), p, &parents));
            parents.push(parent);
        }

        let chain: Vec<BoneId> = INVERTED_CHAIN
            .iter()
            .filter_map(|name| by_name.get(name).copied())
            .collect();
        let is_chain = chain
            .windows(2)
            .all(|pair| parents[pair[0].0] == Some(pair[1]))
            && chain.last().is_some_and(|last| parents[last.0].is_none());
        if is_chain && chain.len() > 1 {
            parents[chain[0].0] = None;
            for pair in chain.windows(2) {
                parents[pair[1].0] = Some(pair[0]);
            }
        }
        parents
    }

    fn present_render_ancestor(
        &self,
        bone: &str,
        by_name: &HashMap<&str, BoneId>,
    ) -> Option<BoneId> {
        let mut current = self.render_parent(bone);
        // A malformed table could loop; it cannot be deeper than its size.
        for _ in 0..=self.render_parents.len() {
            let name = current?;
            if let Some(&id) = by_name.get(name) {
                return Some(id);
            }
            current = self.render_parent(name);
        }
        None
    }
}

/// Whether `parent` already descends from `bone` through `parents`.
///
/// `parents` holds the parents decided so far, which never form a loop, so
/// the walk ends within one more step than their count.
fn closes_loop(bone: BoneId, parent: BoneId, parents: &[Option<BoneId>]) -> bool {
    let mut current = Some(parent);
    for _ in 0..=parents.len() {
        match current {
            Some(node) if node == bone => return true,
            Some(node) => current = parents.get(node.0).copied().flatten(),
            None => return false,
        }
    }
    false
}
