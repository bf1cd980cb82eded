// board/src/devices/inventory.rs
//
// Inventory: 生成要求を記録するだけの DeviceBackend。
// - ランチャとテストが使う。実際の部品は外部の実行ホストが持つ。
// - fail_on(kind) で特定の部品の生成を失敗させられる（致命的失敗の確認用）。

use super::{
    CharBackend, DeviceBackend, DeviceError, DeviceId, DeviceSpec, IrqLine,
};

pub struct DeviceRecord {
    pub id: DeviceId,
    pub spec: DeviceSpec,
    pub char_backend: Option<Box<dyn CharBackend>>,
}

#[derive(Default)]
pub struct Inventory {
    records: Vec<DeviceRecord>,
    fail_on: Option<&'static str>,
}

impl Inventory {
    pub fn new() -> Self {
        Inventory::default()
    }

    pub fn failing_on(kind: &'static str) -> Self {
        Inventory {
            records: Vec::new(),
            fail_on: Some(kind),
        }
    }

    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, kind: &str) -> Option<&DeviceRecord> {
        self.records.iter().find(|r| r.spec.kind() == kind)
    }

    pub fn get(&self, id: DeviceId) -> Option<&DeviceRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn stubs(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.records.iter().filter(|r| r.spec.is_stub())
    }

    pub fn char_backend_mut(&mut self, id: DeviceId) -> Option<&mut (dyn CharBackend + 'static)> {
        self.records
            .iter_mut()
            .find(|r| r.id == id)
            .and_then(|r| r.char_backend.as_deref_mut())
    }
}

impl DeviceBackend for Inventory {
    fn create(&mut self, spec: &DeviceSpec) -> Result<DeviceId, DeviceError> {
        if self.fail_on == Some(spec.kind()) {
            return Err(DeviceError::new("backend refused to create the device"));
        }

        let id = DeviceId(self.records.len() as u32);
        self.records.push(DeviceRecord {
            id,
            spec: spec.clone(),
            char_backend: None,
        });
        log::debug!("device #{} created: {}", id.0, spec.kind());
        Ok(id)
    }

    fn input_line(&self, controller: DeviceId, index: u32) -> Result<IrqLine, DeviceError> {
        match self.get(controller).map(|r| &r.spec) {
            Some(DeviceSpec::InterruptController(p)) => {
                if index == 0 || index >= p.geometry.num_sources {
                    return Err(DeviceError::new(format!("no input line {}", index)));
                }
                Ok(IrqLine { controller, index })
            }
            _ => Err(DeviceError::new(format!(
                "device #{} is not an interrupt controller",
                controller.0
            ))),
        }
    }

    fn bind_char_backend(
        &mut self,
        device: DeviceId,
        backend: Box<dyn CharBackend>,
    ) -> Result<(), DeviceError> {
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == device)
            .ok_or_else(|| DeviceError::new(format!("no device #{}", device.0)))?;

        if !matches!(record.spec, DeviceSpec::Serial(_)) {
            return Err(DeviceError::new("only serial devices take a char backend"));
        }
        if record.char_backend.is_some() {
            return Err(DeviceError::new("char backend already bound"));
        }
        record.char_backend = Some(backend);
        Ok(())
    }
}
