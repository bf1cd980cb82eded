// board/src/platform.rs
//
// PlatformOrchestrator: ボード 1 台を組み立てる状態機械。
//
// [状態遷移]
//   Unconfigured -> MapSelected -> DevicesComposed -> ImagesPlaced -> ResetVectorWritten -> Ready
//   どの段階で失敗しても Failed(stage) で終端（戻らない、やり直さない）。
//
// [設計上の不変条件]
// 1. 遷移は前進のみ・各 1 回。順番を飛ばす呼び出しは InvalidTransition（状態は変えない）。
// 2. hart 数の検査は MapSelected に入る前に済ませる。
//    -> 上限超過のときデバイスは 1 つも作られない。
// 3. Ready になった Platform は読み取り専用。AddressMap / InterruptWiring は共有参照で配ってよい。
// 4. 失敗は CompositionFailure { stage, error } で 1 回だけ報告し、ランチャは非 0 で終わる。

use core::fmt;

use crate::boot::{BootImage, BootImageLocator, BootPlan, DeviceTreeBlob, ResetVector, ResetVectorBuilder};
use crate::compose::{DeviceComposer, Soc};
use crate::devices::{
    CharBackendPool, ControllerHandle, DeviceBackend, DeviceId, HartArrayHandle, InterruptWiring,
    SerialHandle, TimerHandle,
};
use crate::error::{BoardError, CapacityError, ConfigError, Stage};
use crate::logging::trace;
use crate::machine::{BoardEntry, BoardRegistry};
use crate::mem::{AddressMap, BootRom, DeviceRole, Dram};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrchestratorState {
    Unconfigured,
    MapSelected,
    DevicesComposed,
    ImagesPlaced,
    ResetVectorWritten,
    Ready,
    Failed(Stage),
}

impl OrchestratorState {
    pub fn name(self) -> &'static str {
        match self {
            OrchestratorState::Unconfigured => "Unconfigured",
            OrchestratorState::MapSelected => "MapSelected",
            OrchestratorState::DevicesComposed => "DevicesComposed",
            OrchestratorState::ImagesPlaced => "ImagesPlaced",
            OrchestratorState::ResetVectorWritten => "ResetVectorWritten",
            OrchestratorState::Ready => "Ready",
            OrchestratorState::Failed(_) => "Failed",
        }
    }
}

/// 組み立て失敗の報告（どの段階で、何が）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositionFailure {
    pub stage: Stage,
    pub error: BoardError,
}

impl fmt::Display for CompositionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "board composition failed at {}: {}", self.stage, self.error)
    }
}

impl std::error::Error for CompositionFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// マシン全体の指定（hart 数、RAM、ブートイメージ）
#[derive(Clone, Debug)]
pub struct MachineOptions {
    pub smp: u32,
    /// None ならボード既定値
    pub ram_size: Option<u64>,
    pub firmware: Option<BootImage>,
    pub kernel: Option<BootImage>,
    pub device_tree: Option<DeviceTreeBlob>,
}

impl Default for MachineOptions {
    fn default() -> Self {
        MachineOptions {
            smp: 1,
            ram_size: None,
            firmware: None,
            kernel: None,
            device_tree: None,
        }
    }
}

impl MachineOptions {
    pub fn new(smp: u32) -> Self {
        MachineOptions {
            smp,
            ..MachineOptions::default()
        }
    }

    pub fn with_ram_size(self, ram_size: u64) -> Self {
        MachineOptions {
            ram_size: Some(ram_size),
            ..self
        }
    }

    pub fn with_firmware(self, firmware: BootImage) -> Self {
        MachineOptions {
            firmware: Some(firmware),
            ..self
        }
    }

    pub fn with_kernel(self, kernel: BootImage) -> Self {
        MachineOptions {
            kernel: Some(kernel),
            ..self
        }
    }

    pub fn with_device_tree(self, device_tree: DeviceTreeBlob) -> Self {
        MachineOptions {
            device_tree: Some(device_tree),
            ..self
        }
    }
}

/// Ready まで組み上がったボード（読み取り専用）
pub struct Platform<B> {
    board: &'static str,
    map: AddressMap,
    harts: HartArrayHandle,
    plic: ControllerHandle,
    timer: TimerHandle,
    serial: SerialHandle,
    uart1: Option<DeviceId>,
    wiring: InterruptWiring,
    rom: BootRom,
    dram: Dram,
    plan: BootPlan,
    reset_vector: ResetVector,
    backend: B,
}

impl<B> Platform<B> {
    pub fn board(&self) -> &'static str {
        self.board
    }

    pub fn address_map(&self) -> &AddressMap {
        &self.map
    }

    pub fn harts(&self) -> &HartArrayHandle {
        &self.harts
    }

    pub fn interrupt_controller(&self) -> &ControllerHandle {
        &self.plic
    }

    pub fn timer(&self) -> &TimerHandle {
        &self.timer
    }

    pub fn serial(&self) -> &SerialHandle {
        &self.serial
    }

    pub fn uart1(&self) -> Option<DeviceId> {
        self.uart1
    }

    pub fn wiring(&self) -> &InterruptWiring {
        &self.wiring
    }

    pub fn rom(&self) -> &BootRom {
        &self.rom
    }

    pub fn dram(&self) -> &Dram {
        &self.dram
    }

    pub fn boot_plan(&self) -> &BootPlan {
        &self.plan
    }

    pub fn reset_vector(&self) -> &ResetVector {
        &self.reset_vector
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }
}

pub struct PlatformOrchestrator<'r, B: DeviceBackend> {
    registry: &'r BoardRegistry,
    state: OrchestratorState,
    options: MachineOptions,
    pool: CharBackendPool,
    backend: Option<B>,

    entry: Option<&'r BoardEntry>,
    map: Option<AddressMap>,
    dram: Option<Dram>,
    soc: Option<Soc<B>>,
    plan: Option<BootPlan>,
    reset_vector: Option<ResetVector>,
}

impl<'r, B: DeviceBackend> PlatformOrchestrator<'r, B> {
    pub fn new(
        registry: &'r BoardRegistry,
        options: MachineOptions,
        backend: B,
        pool: CharBackendPool,
    ) -> Self {
        PlatformOrchestrator {
            registry,
            state: OrchestratorState::Unconfigured,
            options,
            pool,
            backend: Some(backend),
            entry: None,
            map: None,
            dram: None,
            soc: None,
            plan: None,
            reset_vector: None,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// まだ組み立てに渡していないバックエンド（SelectMap で失敗した場合など）
    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    /// 全段階を順に実行する。
    pub fn run(mut self, board: &str) -> Result<Platform<B>, CompositionFailure> {
        self.select_map(board)?;
        self.compose_devices()?;
        self.place_images()?;
        self.write_reset_vector()?;
        self.finish()
    }

    /// Unconfigured -> MapSelected
    pub fn select_map(&mut self, board: &str) -> Result<(), CompositionFailure> {
        self.enter(OrchestratorState::Unconfigured, OrchestratorState::MapSelected, Stage::SelectMap)?;
        let result = self.do_select_map(board);
        self.settle(result, OrchestratorState::MapSelected, Stage::SelectMap)
    }

    /// MapSelected -> DevicesComposed
    pub fn compose_devices(&mut self) -> Result<(), CompositionFailure> {
        self.enter(OrchestratorState::MapSelected, OrchestratorState::DevicesComposed, Stage::ComposeDevices)?;
        let result = self.do_compose_devices();
        self.settle(result, OrchestratorState::DevicesComposed, Stage::ComposeDevices)
    }

    /// DevicesComposed -> ImagesPlaced
    pub fn place_images(&mut self) -> Result<(), CompositionFailure> {
        self.enter(OrchestratorState::DevicesComposed, OrchestratorState::ImagesPlaced, Stage::PlaceImages)?;
        let result = self.do_place_images();
        self.settle(result, OrchestratorState::ImagesPlaced, Stage::PlaceImages)
    }

    /// ImagesPlaced -> ResetVectorWritten
    pub fn write_reset_vector(&mut self) -> Result<(), CompositionFailure> {
        self.enter(
            OrchestratorState::ImagesPlaced,
            OrchestratorState::ResetVectorWritten,
            Stage::WriteResetVector,
        )?;
        let result = self.do_write_reset_vector();
        self.settle(result, OrchestratorState::ResetVectorWritten, Stage::WriteResetVector)
    }

    /// ResetVectorWritten -> Ready
    pub fn finish(mut self) -> Result<Platform<B>, CompositionFailure> {
        self.enter(OrchestratorState::ResetVectorWritten, OrchestratorState::Ready, Stage::Finalize)?;

        let fail = |what: &'static str| CompositionFailure {
            stage: Stage::Finalize,
            error: ConfigError::MissingComponent(what).into(),
        };
        let entry = self.entry.ok_or_else(|| fail("board"))?;
        let map = self.map.take().ok_or_else(|| fail("address map"))?;
        let dram = self.dram.take().ok_or_else(|| fail("dram"))?;
        let soc = self.soc.take().ok_or_else(|| fail("soc"))?;
        let plan = self.plan.take().ok_or_else(|| fail("boot plan"))?;
        let reset_vector = self.reset_vector.take().ok_or_else(|| fail("reset vector"))?;

        trace::trace_stage(self.state.name(), OrchestratorState::Ready.name());
        self.state = OrchestratorState::Ready;
        log::info!(
            "{}: ready ({} harts, {:#x} bytes of DRAM at {:#x})",
            entry.variant.name,
            soc.harts.count(),
            dram.size(),
            dram.base()
        );

        Ok(Platform {
            board: entry.variant.name,
            map,
            harts: soc.harts,
            plic: soc.plic,
            timer: soc.timer,
            serial: soc.serial,
            uart1: soc.uart1,
            wiring: soc.wiring,
            rom: soc.rom,
            dram,
            plan,
            reset_vector,
            backend: soc.backend,
        })
    }

    fn do_select_map(&mut self, board: &str) -> Result<(), BoardError> {
        let entry = self.registry.get(board)?;
        let variant = &entry.variant;

        // デバイスを作る前に hart 数を確定させる
        let smp = self.options.smp;
        if smp == 0 {
            return Err(ConfigError::NoHarts.into());
        }
        if smp > variant.max_harts {
            return Err(CapacityError::TooManyHarts {
                requested: smp,
                max: variant.max_harts,
            }
            .into());
        }

        let ram_size = self.options.ram_size.unwrap_or(variant.default_ram_size);
        let map = entry.map.with_ram_size(ram_size)?;
        let dram = Dram::new(&map.resolve(DeviceRole::Dram)?)?;
        log::info!(
            "{}: {} ({} harts, {:#x} bytes of RAM as {})",
            variant.name,
            variant.description,
            smp,
            ram_size,
            variant.ram_id
        );

        self.entry = Some(entry);
        self.map = Some(map);
        self.dram = Some(dram);
        Ok(())
    }

    fn do_compose_devices(&mut self) -> Result<(), BoardError> {
        let entry = self.entry.ok_or(ConfigError::MissingComponent("board"))?;
        let map = self.map.as_ref().ok_or(ConfigError::MissingComponent("address map"))?;
        let backend = self
            .backend
            .take()
            .ok_or(ConfigError::MissingComponent("device backend"))?;

        let harts = entry.variant.hart_config(self.options.smp);
        let soc = DeviceComposer::new(&entry.variant, map, &self.pool, backend).compose_all(harts)?;
        self.soc = Some(soc);
        Ok(())
    }

    fn do_place_images(&mut self) -> Result<(), BoardError> {
        let entry = self.entry.ok_or(ConfigError::MissingComponent("board"))?;
        let soc = self.soc.as_ref().ok_or(ConfigError::MissingComponent("soc"))?;
        let dram = self.dram.as_mut().ok_or(ConfigError::MissingComponent("dram"))?;

        let mut locator = BootImageLocator::new(entry.variant.name, entry.policy, dram);
        let end_addr = locator.place_firmware(self.options.firmware.as_ref())?;
        locator.place_kernel(&soc.harts.config, end_addr, self.options.kernel.as_ref())?;
        locator.place_device_tree(self.options.device_tree.as_ref())?;
        self.plan = Some(locator.finish()?);
        Ok(())
    }

    fn do_write_reset_vector(&mut self) -> Result<(), BoardError> {
        let map = self.map.as_ref().ok_or(ConfigError::MissingComponent("address map"))?;
        let dram = self.dram.as_ref().ok_or(ConfigError::MissingComponent("dram"))?;
        let plan = self.plan.as_ref().ok_or(ConfigError::MissingComponent("boot plan"))?;
        let soc = self.soc.as_mut().ok_or(ConfigError::MissingComponent("soc"))?;

        let harts = soc.harts.config;
        // ファームウェアがあればそこへ飛ぶ。カーネルエントリは fw_dynamic_info.next_addr で渡す
        let entry_addr = ResetVectorBuilder::entry_for(plan, dram.base());
        let builder = ResetVectorBuilder::new(harts.xlen).with_next_stage(plan.kernel_entry());
        let vector = builder.build(&map.resolve(DeviceRole::Rom)?, entry_addr, plan.dtb_addr())?;
        builder.install(&mut soc.rom, harts.reset_vector, &vector)?;

        log::info!(
            "reset vector at {:#x}: jump {:#x}, dtb {:#x}, next stage {:#x}",
            harts.reset_vector,
            entry_addr,
            plan.dtb_addr(),
            plan.kernel_entry()
        );
        self.reset_vector = Some(vector);
        Ok(())
    }

    fn enter(
        &self,
        expect: OrchestratorState,
        next: OrchestratorState,
        stage: Stage,
    ) -> Result<(), CompositionFailure> {
        if self.state != expect {
            return Err(CompositionFailure {
                stage,
                error: ConfigError::InvalidTransition {
                    from: self.state.name(),
                    to: next.name(),
                }
                .into(),
            });
        }
        Ok(())
    }

    fn settle(
        &mut self,
        result: Result<(), BoardError>,
        next: OrchestratorState,
        stage: Stage,
    ) -> Result<(), CompositionFailure> {
        match result {
            Ok(()) => {
                trace::trace_stage(self.state.name(), next.name());
                self.state = next;
                Ok(())
            }
            Err(error) => {
                trace::trace_stage(self.state.name(), "Failed");
                self.state = OrchestratorState::Failed(stage);
                Err(CompositionFailure { stage, error })
            }
        }
    }
}

/// 組み立てを実行し、失敗なら診断を 1 行出す。
pub fn launch<B: DeviceBackend>(
    registry: &BoardRegistry,
    board: &str,
    options: MachineOptions,
    backend: B,
    pool: CharBackendPool,
) -> Result<Platform<B>, CompositionFailure> {
    let result = PlatformOrchestrator::new(registry, options, backend, pool).run(board);
    if let Err(failure) = &result {
        log::error!("{}", failure);
    }
    result
}

/// プロセス終了コード（成功 0 / 失敗 1）
pub fn exit_status<T>(result: &Result<T, CompositionFailure>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}
