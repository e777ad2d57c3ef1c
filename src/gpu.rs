use wgpu::util::DeviceExt;

use crate::boundary::Boundary;
use crate::communication::Communication;
use crate::error::{Result, SolverError};
use crate::fields::Fields;
use crate::grid::Grid;
use crate::pressure_solver::{residual_rms, PressureSolver};
use crate::Float;

/// Double-buffered Jacobi relaxation on the GPU. One `solve` call uploads
/// the current pressure and right-hand side, runs a single sweep in f32,
/// reads the result back and finishes with the same boundary pass, halo
/// exchange and residual as the CPU solver, so the two report comparable
/// trajectories.
pub struct JacobiGpuSolver {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,

    p_in_buffer: wgpu::Buffer,
    p_out_buffer: wgpu::Buffer,
    rs_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,

    nx: u32,
    ny: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct JacobiParams {
    nx: u32,
    ny: u32,
    inv_dx2: f32,
    inv_dy2: f32,
    coeff: f32,
    _padding: [u32; 3], // uniform structs are 16-byte aligned
}

impl JacobiGpuSolver {
    pub fn new(grid: &Grid) -> Result<Self> {
        futures::executor::block_on(Self::init(grid))
    }

    async fn init(grid: &Grid) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or_else(|| SolverError::Gpu("no suitable adapter found".into()))?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: None,
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| SolverError::Gpu(format!("device request failed: {e}")))?;

        let nx = (grid.size_x() + 2) as u32;
        let ny = (grid.size_y() + 2) as u32;
        let cell_count = (nx * ny) as usize;
        let buffer_size = (cell_count * std::mem::size_of::<f32>()) as wgpu::BufferAddress;

        let field_buffer = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: buffer_size,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let p_in_buffer = field_buffer("Pressure In");
        let p_out_buffer = field_buffer("Pressure Out");
        let rs_buffer = field_buffer("RHS");

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pressure Staging"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut fluid_mask = vec![0u32; cell_count];
        for &(i, j) in grid.fluid_cells() {
            fluid_mask[i + j * nx as usize] = 1;
        }

        let mask_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fluid Mask"),
            contents: bytemuck::cast_slice(&fluid_mask),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let dx = grid.dx();
        let dy = grid.dy();
        let inv_dx2 = (1.0 / (dx * dx)) as f32;
        let inv_dy2 = (1.0 / (dy * dy)) as f32;
        let params = JacobiParams {
            nx,
            ny,
            inv_dx2,
            inv_dy2,
            coeff: 1.0 / (2.0 * (inv_dx2 + inv_dy2)),
            _padding: [0; 3],
        };
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Jacobi Params"),
            contents: bytemuck::cast_slice(&[params]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Jacobi Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/pressure.wgsl").into()),
        });

        let storage_entry = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Jacobi Bind Group Layout"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                storage_entry(2, true),
                storage_entry(3, true),
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Jacobi Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Jacobi Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Jacobi Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: p_in_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: p_out_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: rs_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: mask_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group,
            p_in_buffer,
            p_out_buffer,
            rs_buffer,
            staging_buffer,
            nx,
            ny,
        })
    }

    fn upload(&self, fields: &Fields) {
        let downcast = |m: &crate::matrix::Matrix<Float>| -> Vec<f32> {
            m.iter().map(|&v| v as f32).collect()
        };
        self.queue
            .write_buffer(&self.p_in_buffer, 0, bytemuck::cast_slice(&downcast(&fields.p)));
        self.queue
            .write_buffer(&self.rs_buffer, 0, bytemuck::cast_slice(&downcast(&fields.rs)));
    }

    fn dispatch(&self) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Jacobi Step Encoder"),
            });

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Jacobi Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &self.bind_group, &[]);
            let workgroup_size = 8;
            compute_pass.dispatch_workgroups(
                self.nx.div_ceil(workgroup_size),
                self.ny.div_ceil(workgroup_size),
                1,
            );
        }

        let size = (self.nx * self.ny) as u64 * std::mem::size_of::<f32>() as u64;
        encoder.copy_buffer_to_buffer(&self.p_out_buffer, 0, &self.staging_buffer, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    async fn read_back(&self, fields: &mut Fields) -> Result<()> {
        let buffer_slice = self.staging_buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        let _ = self.device.poll(wgpu::Maintain::Wait);
        receiver
            .await
            .map_err(|_| SolverError::Gpu("readback channel closed".into()))?
            .map_err(|e| SolverError::Gpu(format!("buffer map failed: {e:?}")))?;

        {
            let data = buffer_slice.get_mapped_range();
            let values: &[f32] = bytemuck::cast_slice(&data);
            let nx = self.nx as usize;
            for j in 0..self.ny as usize {
                for i in 0..nx {
                    fields.p[(i, j)] = values[i + j * nx] as Float;
                }
            }
        }
        self.staging_buffer.unmap();
        Ok(())
    }
}

impl PressureSolver for JacobiGpuSolver {
    fn solve(
        &mut self,
        fields: &mut Fields,
        grid: &Grid,
        boundaries: &[Boundary],
        comm: &dyn Communication,
    ) -> Result<Float> {
        self.upload(fields);
        self.dispatch();
        futures::executor::block_on(self.read_back(fields))?;

        for boundary in boundaries {
            boundary.apply_pressure(grid, fields);
        }
        comm.communicate(&mut fields.p);

        Ok(residual_rms(fields, grid, comm))
    }
}
