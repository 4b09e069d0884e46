use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace};
use uuid::Uuid;

use super::Delivery;
use super::error::ControlError;
use super::resolver::TaskResolver;
use crate::registry::{EventSink, SubscriptionId, TaskId, TaskRegistry};
use crate::render::SlotId;

/// 一个可见槽位与一个任务回调订阅之间的绑定。绑定不拥有任务本身。
#[derive(Debug)]
pub struct RowBinding {
    pub id: TaskId,
    /// 每次绑定都生成新标签，回调投递时据此识别过期回调
    pub tag: Uuid,
    subscription: SubscriptionId,
}

/// 管理每个可见槽位的订阅：先解绑旧任务，再为新任务订阅
pub struct RowBindingManager {
    registry: Arc<dyn TaskRegistry>,
    resolver: TaskResolver,
    bindings: HashMap<SlotId, RowBinding>,
    sender: UnboundedSender<Delivery>,
}

impl RowBindingManager {
    pub fn new(registry: Arc<dyn TaskRegistry>, sender: UnboundedSender<Delivery>) -> Self {
        Self {
            resolver: TaskResolver::new(registry.clone()),
            registry,
            bindings: HashMap::new(),
            sender,
        }
    }

    /// 把槽位绑定到 `id`。查不到任务时返回 `LookupMiss`，槽位保持未绑定。
    pub fn bind(&mut self, slot: SlotId, id: &TaskId) -> Result<(), ControlError> {
        if let Some(existing) = self.bindings.get(&slot) {
            if &existing.id == id {
                return Ok(());
            }
            self.unbind(slot);
        }

        let handle = self.resolver.resolve(id)?;
        let tag = Uuid::new_v4();
        let sender = self.sender.clone();
        let sink: EventSink = Arc::new(move |event| {
            // 控制器已退出时接收端关闭，丢弃即可
            let _ = sender.send(Delivery::Row { slot, tag, event });
        });
        let subscription = self
            .registry
            .subscribe(&handle, sink)
            .ok_or_else(|| ControlError::LookupMiss(id.clone()))?;

        debug!("槽位 {:?} 绑定任务: {}", slot, id);
        self.bindings.insert(
            slot,
            RowBinding {
                id: id.clone(),
                tag,
                subscription,
            },
        );
        Ok(())
    }

    /// 取消槽位的订阅，不影响底层传输。重复调用是安全的。
    pub fn unbind(&mut self, slot: SlotId) -> bool {
        match self.bindings.remove(&slot) {
            Some(binding) => {
                self.registry.unsubscribe(binding.subscription);
                debug!("槽位 {:?} 解绑任务: {}", slot, binding.id);
                true
            }
            None => false,
        }
    }

    /// 解绑所有绑定到 `id` 的槽位
    pub fn unbind_task(&mut self, id: &TaskId) -> Vec<SlotId> {
        let slots: Vec<SlotId> = self
            .bindings
            .iter()
            .filter(|(_, binding)| &binding.id == id)
            .map(|(slot, _)| *slot)
            .collect();
        for slot in &slots {
            self.unbind(*slot);
        }
        slots
    }

    /// 校验一次回调投递：槽位仍绑定着创建该订阅时的任务才放行
    pub fn accept(&self, slot: SlotId, tag: Uuid) -> Option<&TaskId> {
        match self.bindings.get(&slot) {
            Some(binding) if binding.tag == tag => Some(&binding.id),
            _ => {
                trace!("丢弃过期回调: 槽位 {:?}", slot);
                None
            }
        }
    }

    pub fn bound_id(&self, slot: SlotId) -> Option<&TaskId> {
        self.bindings.get(&slot).map(|binding| &binding.id)
    }

    pub fn binding(&self, slot: SlotId) -> Option<&RowBinding> {
        self.bindings.get(&slot)
    }

    /// 当前所有绑定，按槽位排序
    pub fn bound_slots(&self) -> Vec<(SlotId, TaskId)> {
        let mut slots: Vec<_> = self
            .bindings
            .iter()
            .map(|(slot, binding)| (*slot, binding.id.clone()))
            .collect();
        slots.sort();
        slots
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Drop for RowBindingManager {
    fn drop(&mut self) {
        for (_, binding) in self.bindings.drain() {
            self.registry.unsubscribe(binding.subscription);
        }
    }
}
