/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The engine's view of live frames. Each node holds the owning reference to
//! its current `SiteInstance` (by id; the refcount lives in the graph).
//! Script reachability between frames, openers included, is tracked through
//! shared BrowsingInstance membership in the graph, not here.

use std::collections::HashMap;

use base::id::{FrameTreeNodeId, SiteInstanceId};
use log::warn;

#[derive(Debug)]
pub struct FrameTreeNode {
    id: FrameTreeNodeId,
    parent: Option<FrameTreeNodeId>,
    children: Vec<FrameTreeNodeId>,
    site_instance: SiteInstanceId,
}

impl FrameTreeNode {
    pub fn id(&self) -> FrameTreeNodeId {
        self.id
    }

    pub fn parent(&self) -> Option<FrameTreeNodeId> {
        self.parent
    }

    pub fn children(&self) -> &[FrameTreeNodeId] {
        &self.children
    }

    pub fn site_instance(&self) -> SiteInstanceId {
        self.site_instance
    }

    pub fn is_main_frame(&self) -> bool {
        self.parent.is_none()
    }
}

#[derive(Default)]
pub struct FrameTree {
    nodes: HashMap<FrameTreeNodeId, FrameTreeNode>,
}

impl FrameTree {
    pub fn new() -> FrameTree {
        Default::default()
    }

    pub fn get(&self, id: FrameTreeNodeId) -> Option<&FrameTreeNode> {
        self.nodes.get(&id)
    }

    /// Inserts a root frame (a tab or a popup). The caller has already
    /// added the frame's reference on the SiteInstance.
    pub fn insert_root(&mut self, site_instance: SiteInstanceId) -> FrameTreeNodeId {
        let id = FrameTreeNodeId::new();
        self.nodes.insert(
            id,
            FrameTreeNode {
                id,
                parent: None,
                children: Vec::new(),
                site_instance,
            },
        );
        id
    }

    pub fn insert_child(
        &mut self,
        parent: FrameTreeNodeId,
        site_instance: SiteInstanceId,
    ) -> Option<FrameTreeNodeId> {
        if !self.nodes.contains_key(&parent) {
            warn!("insert_child under unknown frame {}", parent);
            return None;
        }
        let id = FrameTreeNodeId::new();
        self.nodes.insert(
            id,
            FrameTreeNode {
                id,
                parent: Some(parent),
                children: Vec::new(),
                site_instance,
            },
        );
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(id);
        }
        Some(id)
    }

    pub fn set_site_instance(&mut self, id: FrameTreeNodeId, site_instance: SiteInstanceId) {
        match self.nodes.get_mut(&id) {
            Some(node) => node.site_instance = site_instance,
            None => warn!("set_site_instance on unknown frame {}", id),
        }
    }

    /// The frame ids of `root`'s subtree, including `root` itself.
    pub fn subtree_of(&self, root: FrameTreeNodeId) -> Vec<FrameTreeNodeId> {
        let mut result = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            result.push(id);
            stack.extend(node.children.iter().copied());
        }
        result
    }

    /// Removes `root` and its subtree, returning the removed nodes'
    /// SiteInstance references for the caller to release.
    pub fn remove_subtree(&mut self, root: FrameTreeNodeId) -> Vec<SiteInstanceId> {
        let removed = self.subtree_of(root);
        if let Some(parent) = self.nodes.get(&root).and_then(FrameTreeNode::parent) {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.retain(|child| *child != root);
            }
        }
        removed
            .into_iter()
            .filter_map(|id| self.nodes.remove(&id).map(|node| node.site_instance))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameTreeNode> {
        self.nodes.values()
    }
}
