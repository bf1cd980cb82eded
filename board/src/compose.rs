// board/src/compose.rs
//
// DeviceComposer: SoC 部品を AddressMap に従って生成し、割り込み線を配線する。
//
// 役割:
// - hart 配列 / PLIC / ACLINT(SWI + MTIMER) / UART0 / UART1(スタブ) / ROM を 1 回ずつ生成する。
// - UART0 の割り込み出力を PLIC の固定入力番号へつなぐ。
//
// [設計上の不変条件]
// 1. 各 attach_* は 1 回だけ。2 回目は AlreadyAttached（シリアルのホスト資源は 1 つしか無い）。
// 2. hart 数の検査はバックエンドに触る前に行う（失敗時にデバイスは 1 つも無い）。
// 3. 生成失敗はすべて致命的。中途半端に配線された SoC は外に出さない。
// 4. 組み立て後に AddressMap を書き換えることはない（&AddressMap しか持たない）。

use crate::devices::aclint::{
    ACLINT_DEFAULT_MTIMECMP, ACLINT_DEFAULT_MTIME, ACLINT_DEFAULT_TIMEBASE_FREQ, MTIMER_SUB_REGION,
    SWI_SUB_REGION,
};
use crate::devices::serial::NullBackend;
use crate::devices::{
    CharBackend, CharBackendPool, ControllerHandle, DeviceBackend, DeviceId, DeviceSpec, HartArrayHandle,
    HartConfig, HartModes, InterruptWiring, MtimerParams, PlicParams, SerialHandle, SerialParams,
    SwiParams, TimerHandle,
};
use crate::devices::StubParams;
use crate::error::{CapacityError, ConfigError, Result};
use crate::machine::{BoardVariant, SecondaryUart};
use crate::mem::{AddressMap, BootRom, DeviceRole};
use crate::types::PhysAddr;

bitflags::bitflags! {
    /// 生成済みの部品
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Attached: u8 {
        const HARTS = 1 << 0;
        const PLIC = 1 << 1;
        const TIMER = 1 << 2;
        const SERIAL = 1 << 3;
        const UART1 = 1 << 4;
        const ROM = 1 << 5;
    }
}

/// UART0 の割り込み出力は 1 本（line 0）
const SERIAL_IRQ_OUTPUT: u32 = 0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RomHandle {
    pub base: PhysAddr,
    pub size: u64,
}

/// 組み立て済みの SoC
pub struct Soc<B> {
    pub harts: HartArrayHandle,
    pub plic: ControllerHandle,
    pub timer: TimerHandle,
    pub serial: SerialHandle,
    pub uart1: Option<DeviceId>,
    pub rom: BootRom,
    pub wiring: InterruptWiring,
    pub backend: B,
}

pub struct DeviceComposer<'a, B: DeviceBackend> {
    variant: &'a BoardVariant,
    map: &'a AddressMap,
    pool: &'a CharBackendPool,
    backend: B,
    wiring: InterruptWiring,
    attached: Attached,

    harts: Option<HartArrayHandle>,
    plic: Option<ControllerHandle>,
    timer: Option<TimerHandle>,
    serial: Option<SerialHandle>,
    uart1: Option<DeviceId>,
    rom: Option<BootRom>,
}

impl<'a, B: DeviceBackend> DeviceComposer<'a, B> {
    pub fn new(
        variant: &'a BoardVariant,
        map: &'a AddressMap,
        pool: &'a CharBackendPool,
        backend: B,
    ) -> Self {
        DeviceComposer {
            variant,
            map,
            pool,
            backend,
            wiring: InterruptWiring::new(),
            attached: Attached::empty(),
            harts: None,
            plic: None,
            timer: None,
            serial: None,
            uart1: None,
            rom: None,
        }
    }

    /// 部品一式を元の SoC と同じ順（CPU → PLIC → CLINT → UART0 → UART1 → ROM）で組む。
    pub fn compose_all(mut self, config: HartConfig) -> Result<Soc<B>> {
        let harts = self.attach_harts(config)?;
        let plic = self.attach_interrupt_controller()?;
        self.attach_timer_complex(harts.count())?;
        self.attach_serial(&plic, self.variant.uart0_irq)?;
        if self.variant.uart1 == SecondaryUart::Stub {
            self.attach_uart1_stub()?;
        }
        self.attach_rom()?;
        self.finish()
    }

    pub fn attach_harts(&mut self, config: HartConfig) -> Result<HartArrayHandle> {
        if config.count == 0 {
            return Err(ConfigError::NoHarts.into());
        }
        if config.count > self.variant.max_harts {
            return Err(CapacityError::TooManyHarts {
                requested: config.count,
                max: self.variant.max_harts,
            }
            .into());
        }
        self.claim(Attached::HARTS, "hart array")?;

        let device = self.create(&DeviceSpec::HartArray(config))?;
        let handle = HartArrayHandle { device, config };
        self.harts = Some(handle);
        log::info!(
            "harts: {} x {} (hartid base {}, reset vector {:#x})",
            config.count,
            config.cpu_type,
            config.hart_id_base,
            config.reset_vector
        );
        Ok(handle)
    }

    pub fn attach_interrupt_controller(&mut self) -> Result<ControllerHandle> {
        let harts = self.require_harts("interrupt controller")?;
        self.claim(Attached::PLIC, "interrupt controller")?;

        let region = self.map.resolve(DeviceRole::Plic)?;
        let geometry = self.variant.plic;
        let params = PlicParams {
            base: region.base,
            geometry,
            modes: HartModes::parse(geometry.hart_config)?,
            num_harts: harts.count(),
            hart_id_base: harts.config.hart_id_base,
            region_size: region.size()?,
        };

        let device = self.create(&DeviceSpec::InterruptController(params))?;
        let handle = ControllerHandle {
            device,
            num_sources: geometry.num_sources,
        };
        self.plic = Some(handle);
        log::info!(
            "plic: base={:#x} sources={} priorities={}",
            params.base,
            geometry.num_sources,
            geometry.num_priorities
        );
        Ok(handle)
    }

    pub fn attach_timer_complex(&mut self, count: u32) -> Result<TimerHandle> {
        let harts = self.require_harts("timer complex")?;
        if count == 0 {
            return Err(ConfigError::NoHarts.into());
        }
        if count > self.variant.max_harts {
            return Err(CapacityError::TooManyHarts {
                requested: count,
                max: self.variant.max_harts,
            }
            .into());
        }
        self.claim(Attached::TIMER, "timer complex")?;

        let clint = self.map.resolve(DeviceRole::Clint)?;
        let swi_region = self.map.sub_region(DeviceRole::Clint, SWI_SUB_REGION)?;
        let mtimer_region = self.map.sub_region(DeviceRole::Clint, MTIMER_SUB_REGION)?;
        debug_assert_eq!(swi_region.base, clint.base);

        let hart_id_base = harts.config.hart_id_base;
        let swi = self.create(&DeviceSpec::SoftwareInterrupt(SwiParams {
            base: swi_region.base,
            hart_id_base,
            num_harts: count,
            supervisor: false,
        }))?;
        let mtimer = self.create(&DeviceSpec::MachineTimer(MtimerParams {
            base: mtimer_region.base,
            size: mtimer_region.size,
            hart_id_base,
            num_harts: count,
            timecmp_offset: ACLINT_DEFAULT_MTIMECMP,
            time_offset: ACLINT_DEFAULT_MTIME,
            timebase_freq: ACLINT_DEFAULT_TIMEBASE_FREQ,
            provide_rdtime: false,
        }))?;

        let handle = TimerHandle {
            swi,
            mtimer,
            num_harts: count,
        };
        self.timer = Some(handle);
        log::info!("aclint: swi={:#x} mtimer={:#x}", swi_region.base, mtimer_region.base);
        Ok(handle)
    }

    pub fn attach_serial(&mut self, controller: &ControllerHandle, irq_line: u32) -> Result<SerialHandle> {
        if self.plic.as_ref() != Some(controller) {
            return Err(ConfigError::OutOfOrder {
                component: "serial",
                requires: "interrupt controller",
            }
            .into());
        }
        controller.check_index(irq_line)?;
        self.claim(Attached::SERIAL, "serial")?;

        let region = self.map.resolve(DeviceRole::Uart0)?;
        let irq = self
            .backend
            .input_line(controller.device, irq_line)
            .map_err(|e| ConfigError::DeviceCreation {
                device: "serial",
                reason: e.reason,
            })?;

        let device = self.create(&DeviceSpec::Serial(SerialParams {
            name: "uart0",
            base: region.base,
            size: region.size()?,
            config: self.variant.uart,
            irq,
        }))?;
        self.wiring.connect(device, SERIAL_IRQ_OUTPUT, irq)?;

        let backend: Box<dyn CharBackend> = match self.pool.take_next() {
            Some(b) => b,
            None => {
                log::warn!("uart0: no host char backend left, output is discarded");
                Box::new(NullBackend)
            }
        };
        let backend_label = backend.label().to_string();
        self.backend
            .bind_char_backend(device, backend)
            .map_err(|e| ConfigError::DeviceCreation {
                device: "serial",
                reason: e.reason,
            })?;

        let handle = SerialHandle {
            device,
            irq,
            backend_label,
        };
        log::info!(
            "uart0: base={:#x} irq={} backend={}",
            region.base,
            irq.index,
            handle.backend_label
        );
        self.serial = Some(handle.clone());
        Ok(handle)
    }

    /// 未実装デバイス（アドレスだけ予約）
    pub fn attach_uart1_stub(&mut self) -> Result<DeviceId> {
        self.claim(Attached::UART1, "uart1")?;

        let region = self.map.resolve(DeviceRole::Uart1)?;
        let device = self.create(&DeviceSpec::Stub(StubParams {
            name: region.name,
            base: region.base,
            size: region.size()?,
        }))?;
        self.uart1 = Some(device);
        log::info!("uart1: unimplemented stub at {:#x}", region.base);
        Ok(device)
    }

    pub fn attach_rom(&mut self) -> Result<RomHandle> {
        self.claim(Attached::ROM, "rom")?;

        let region = self.map.resolve(DeviceRole::Rom)?;
        let rom = BootRom::new(&region)?;
        let handle = RomHandle {
            base: rom.base(),
            size: rom.size(),
        };
        self.rom = Some(rom);
        log::info!("rom: base={:#x} size={:#x}", handle.base, handle.size);
        Ok(handle)
    }

    /// 必須部品が揃っていれば SoC を返す。
    pub fn finish(self) -> Result<Soc<B>> {
        let missing = |name| ConfigError::MissingComponent(name);
        let harts = self.harts.ok_or(missing("hart array"))?;
        let plic = self.plic.ok_or(missing("interrupt controller"))?;
        let timer = self.timer.ok_or(missing("timer complex"))?;
        let serial = self.serial.ok_or(missing("serial"))?;
        let rom = self.rom.ok_or(missing("rom"))?;
        if self.variant.uart1 == SecondaryUart::Stub && self.uart1.is_none() {
            return Err(missing("uart1").into());
        }

        Ok(Soc {
            harts,
            plic,
            timer,
            serial,
            uart1: self.uart1,
            rom,
            wiring: self.wiring,
            backend: self.backend,
        })
    }

    fn claim(&mut self, part: Attached, name: &'static str) -> Result<()> {
        if self.attached.contains(part) {
            return Err(ConfigError::AlreadyAttached(name).into());
        }
        self.attached |= part;
        Ok(())
    }

    fn require_harts(&self, component: &'static str) -> Result<HartArrayHandle> {
        self.harts.ok_or_else(|| {
            ConfigError::OutOfOrder {
                component,
                requires: "hart array",
            }
            .into()
        })
    }

    fn create(&mut self, spec: &DeviceSpec) -> Result<DeviceId> {
        self.backend.create(spec).map_err(|e| {
            ConfigError::DeviceCreation {
                device: spec.kind(),
                reason: e.reason,
            }
            .into()
        })
    }
}
